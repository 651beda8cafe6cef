//! ESP32-S3 board support for the keylink remote: key matrix, flash config,
//! ESP-NOW transport, battery ADC and GPIO feedback.

#![no_std]

pub mod battery;
pub mod feedback;
pub mod input;
pub mod radio;
pub mod storage;

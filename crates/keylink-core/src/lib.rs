//! Hardware-independent control core for the keylink keypad remote.
//!
//! Everything here is driven by a single cooperative control cycle and talks to
//! the board only through the traits in [`input`], [`battery`], [`settings`],
//! [`feedback`], [`dispatch`] and [`controller`].

#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod command;
pub mod controller;
pub mod dispatch;
pub mod feedback;
pub mod input;
pub mod keys;
pub mod power;
pub mod settings;
pub mod timers;

use super::*;

const FN: KeyId = KeyId(1);
const PWR: KeyId = KeyId(2);
const VOL_UP: KeyId = KeyId(5);
const MUTE: KeyId = KeyId(6);

fn interpreter() -> KeyInterpreter {
    KeyInterpreter::new(KeyLayout::new(FN, PWR))
}

#[derive(Default)]
struct Tally {
    commands: Vec<Command>,
    patterns: Vec<FeedbackPattern>,
    backlight_steps: usize,
    haptics: usize,
}

impl Tally {
    fn absorb(&mut self, reaction: Reaction) {
        self.commands.extend(reaction.command);
        self.patterns.extend(reaction.pattern);
        self.backlight_steps += usize::from(reaction.backlight.is_some());
        self.haptics += usize::from(reaction.haptic);
    }
}

#[test]
fn plain_key_sends_on_release() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(VOL_UP, 0));
    assert!(tally.commands.is_empty());
    tally.absorb(keys.on_key_up(VOL_UP));

    assert_eq!(tally.commands, vec![Command::send(VOL_UP)]);
    assert!(tally.patterns.is_empty());
}

#[test]
fn fn_tap_steps_backlight_without_transmitting() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(FN, 0));
    assert!(keys.is_learning());
    tally.absorb(keys.on_key_up(FN));

    assert!(tally.commands.is_empty());
    assert_eq!(tally.backlight_steps, 1);
    assert_eq!(keys.backlight().step(), BacklightLevel::MIN_STEP + 1);
    assert!(!keys.is_learning());
}

#[test]
fn fn_held_learns_the_next_key_once() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(FN, 0));
    tally.absorb(keys.on_key_down(MUTE, 10));
    tally.absorb(keys.on_key_up(MUTE));
    tally.absorb(keys.on_key_up(FN));

    assert_eq!(
        tally.commands,
        vec![Command::new(MUTE, Action::LearnSignal)]
    );
    assert_eq!(tally.patterns, vec![FeedbackPattern::LearnAck]);
    assert_eq!(tally.backlight_steps, 0);
    assert_eq!(keys.backlight(), BacklightLevel::default());

    // Back to normal sending afterwards.
    tally.absorb(keys.on_key_down(MUTE, 20));
    tally.absorb(keys.on_key_up(MUTE));
    assert_eq!(tally.commands.last(), Some(&Command::send(MUTE)));
}

#[test]
fn key_pressed_before_fn_is_learned_when_released_under_fn() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(VOL_UP, 0));
    tally.absorb(keys.on_key_down(FN, 5));
    tally.absorb(keys.on_key_up(VOL_UP));
    tally.absorb(keys.on_key_up(FN));

    assert_eq!(
        tally.commands,
        vec![Command::new(VOL_UP, Action::LearnSignal)]
    );
    assert_eq!(tally.backlight_steps, 0);
}

#[test]
fn backlight_wraps_and_max_level_pulses_haptic() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    for _ in 0..(BacklightLevel::MAX_STEP - BacklightLevel::MIN_STEP) {
        tally.absorb(keys.on_key_down(FN, 0));
        tally.absorb(keys.on_key_up(FN));
    }
    assert!(keys.backlight().is_max());
    let haptics_before = tally.haptics;

    tally.absorb(keys.on_key_down(VOL_UP, 0));
    assert_eq!(tally.haptics, haptics_before + 1);
    tally.absorb(keys.on_key_up(VOL_UP));

    tally.absorb(keys.on_key_down(FN, 0));
    tally.absorb(keys.on_key_up(FN));
    assert_eq!(keys.backlight().step(), BacklightLevel::MIN_STEP);

    let haptics_before = tally.haptics;
    tally.absorb(keys.on_key_down(VOL_UP, 0));
    assert_eq!(tally.haptics, haptics_before);
}

#[test]
fn power_long_press_issues_exactly_one_factory_reset() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(PWR, 1_000));
    assert!(keys.power_key_held());
    for now in (1_000..=9_000).step_by(250) {
        tally.absorb(keys.check_long_press(now));
    }
    for now in 9_000..9_100 {
        tally.absorb(keys.check_long_press(now));
    }
    assert!(!keys.power_key_held());
    tally.absorb(keys.on_key_up(PWR));

    assert_eq!(
        tally.commands,
        vec![Command::new(PWR, Action::FactoryReset)]
    );
    assert_eq!(tally.patterns, vec![FeedbackPattern::DataSaved]);
}

#[test]
fn short_power_press_is_an_ordinary_key() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(PWR, 0));
    tally.absorb(keys.check_long_press(LONG_PRESS_MS - 1));
    tally.absorb(keys.on_key_up(PWR));
    tally.absorb(keys.check_long_press(LONG_PRESS_MS + 10));

    assert_eq!(tally.commands, vec![Command::send(PWR)]);
}

#[test]
fn factory_reset_ignores_concurrent_keys() {
    let mut keys = interpreter();
    let mut tally = Tally::default();

    tally.absorb(keys.on_key_down(FN, 0));
    tally.absorb(keys.on_key_down(PWR, 100));
    tally.absorb(keys.on_key_down(MUTE, 200));
    tally.absorb(keys.check_long_press(100 + LONG_PRESS_MS));
    tally.absorb(keys.on_key_up(MUTE));
    tally.absorb(keys.on_key_up(FN));
    tally.absorb(keys.on_key_up(PWR));

    assert_eq!(
        tally.commands,
        vec![Command::new(PWR, Action::FactoryReset)]
    );
    assert_eq!(tally.backlight_steps, 0);

    tally.absorb(keys.on_key_down(MUTE, 20_000));
    tally.absorb(keys.on_key_up(MUTE));
    assert_eq!(tally.commands.last(), Some(&Command::send(MUTE)));
}

#[test]
fn custom_long_press_threshold_is_honoured() {
    let mut keys = KeyInterpreter::new(KeyLayout::new(FN, PWR).with_long_press_ms(500));

    let _ = keys.on_key_down(PWR, 0);
    assert!(keys.check_long_press(499).is_empty());
    assert_eq!(
        keys.check_long_press(500).command,
        Some(Command::new(PWR, Action::FactoryReset))
    );
}

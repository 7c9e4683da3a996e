use crate::board::Board;

/// What the pedal does with its external controls.
#[derive(PartialEq, Eq)]
pub enum Mode {
    /// Learn the travel of whatever is plugged into the external control jacks
    Calibrate,
    /// Normal operation
    Play,
}

/// `read(board)` is the mode currently selected by the foot switches.
///
/// Calibration is requested by holding foot switch 1 and lasts until it is released.
pub fn read(board: &Board) -> Mode {
    match board.calibrate_switch_held() {
        true => Mode::Calibrate,
        false => Mode::Play,
    }
}

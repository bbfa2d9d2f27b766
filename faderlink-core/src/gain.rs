//! Gain coefficient conversions shared by the encoder and inbound commands.

/// Highest linear gain a route accepts (+6 dB).
pub const MAX_GAIN: f64 = 2.0;

/// Below this coefficient a gain is reported as [`DB_FLOOR`].
pub const SILENCE_THRESHOLD: f64 = 1e-15;

/// Decibel value sent for silent gains instead of `-inf`.
pub const DB_FLOOR: f64 = -200.0;

/// Linear coefficient to decibels, floored at [`DB_FLOOR`].
pub fn coefficient_to_db(gain: f64) -> f64 {
    if !gain.is_finite() || gain < SILENCE_THRESHOLD {
        DB_FLOOR
    } else {
        20.0 * gain.log10()
    }
}

pub fn db_to_coefficient(db: f64) -> f64 {
    if !db.is_finite() || db <= DB_FLOOR {
        0.0
    } else {
        10.0_f64.powf(db / 20.0)
    }
}

/// Map a linear gain onto a normalized fader position in `[0, 1]`.
///
/// Unity gain sits at roughly 0.78, [`MAX_GAIN`] at 1.0.
pub fn gain_to_slider_position(gain: f64) -> f64 {
    if !gain.is_finite() || gain <= 0.0 {
        return 0.0;
    }
    let base = ((6.0 * gain.log2() + 192.0) / 198.0).max(0.0);
    base.powi(8).min(1.0)
}

/// Inverse of [`gain_to_slider_position`].
pub fn slider_position_to_gain(position: f64) -> f64 {
    if !position.is_finite() || position <= 0.0 {
        return 0.0;
    }
    let position = position.min(1.0);
    2.0_f64.powf((position.sqrt().sqrt().sqrt() * 198.0 - 192.0) / 6.0)
}

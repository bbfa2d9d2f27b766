//! Strip state → OSC message encoding.
//!
//! Every message starts with the route's remote-control id as int32.
//! Gain is the only property whose path and value depend on the peer's
//! [`GainMode`]; the rest use a fixed path.

use rosc::{OscMessage, OscType};

use faderlink_types::{paths, GainMode, RemoteControlId};

use crate::gain::{coefficient_to_db, gain_to_slider_position};

/// A strip property value captured at notification time.
#[derive(Debug, Clone, PartialEq)]
pub enum StripValue {
    Name(String),
    Mute(f64),
    Solo(f64),
    RecEnable(f64),
    Gain(f64),
}

impl StripValue {
    pub fn is_gain(&self) -> bool {
        matches!(self, StripValue::Gain(_))
    }
}

/// Path and numeric argument for a gain value under `mode`.
pub fn encode_gain(gain: f64, mode: GainMode) -> (&'static str, f32) {
    match mode {
        GainMode::Db => (paths::STRIP_GAIN_DB, coefficient_to_db(gain) as f32),
        GainMode::Fader => (paths::STRIP_FADER, gain_to_slider_position(gain) as f32),
        GainMode::Fader1024 => (
            paths::STRIP_FADER_1024,
            (gain_to_slider_position(gain) * 1023.0) as f32,
        ),
        GainMode::Absolute => (paths::STRIP_GAIN_ABS, gain as f32),
    }
}

/// Build the outbound message for one property change.
pub fn encode(id: RemoteControlId, value: &StripValue, mode: GainMode) -> OscMessage {
    let id = OscType::Int(id.wire());
    let (addr, arg) = match value {
        StripValue::Name(name) => (paths::STRIP_NAME, OscType::String(name.clone())),
        StripValue::Mute(v) => (paths::STRIP_MUTE, OscType::Float(*v as f32)),
        StripValue::Solo(v) => (paths::STRIP_SOLO, OscType::Float(*v as f32)),
        StripValue::RecEnable(v) => (paths::STRIP_RECENABLE, OscType::Float(*v as f32)),
        StripValue::Gain(g) => {
            let (addr, v) = encode_gain(*g, mode);
            (addr, OscType::Float(v))
        }
    };
    OscMessage {
        addr: addr.to_string(),
        args: vec![id, arg],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gain::DB_FLOOR;

    const SWEEP: [f64; 6] = [0.0, 1e-16, 1e-15, 0.5, 1.0, 4.0];

    fn float_arg(msg: &OscMessage) -> f32 {
        match msg.args.get(1) {
            Some(OscType::Float(v)) => *v,
            other => panic!("expected float arg, got {:?}", other),
        }
    }

    #[test]
    fn gain_modes_across_sweep() {
        let id = RemoteControlId::new(3);
        for gain in SWEEP {
            let value = StripValue::Gain(gain);

            let abs = encode(id, &value, GainMode::Absolute);
            assert_eq!(abs.addr, "/strip/gainabs");
            assert_eq!(float_arg(&abs), gain as f32);

            let db = encode(id, &value, GainMode::Db);
            assert_eq!(db.addr, "/strip/gaindB");
            let expected = if gain < 1e-15 { DB_FLOOR } else { 20.0 * gain.log10() };
            assert_eq!(float_arg(&db), expected as f32);
            assert!(float_arg(&db).is_finite());

            let fader = encode(id, &value, GainMode::Fader);
            assert_eq!(fader.addr, "/strip/fader");
            let pos = gain_to_slider_position(gain);
            assert_eq!(float_arg(&fader), pos as f32);
            assert!((0.0..=1.0).contains(&float_arg(&fader)));

            let fader1024 = encode(id, &value, GainMode::Fader1024);
            assert_eq!(fader1024.addr, "/strip/fader1024");
            assert_eq!(float_arg(&fader1024), (pos * 1023.0) as f32);
            assert!((0.0..=1023.0).contains(&float_arg(&fader1024)));
        }
    }

    #[test]
    fn unity_gain_in_db_is_zero() {
        let msg = encode(RemoteControlId::new(3), &StripValue::Gain(1.0), GainMode::Db);
        assert_eq!(msg.args, vec![OscType::Int(3), OscType::Float(0.0)]);
    }

    #[test]
    fn fixed_paths_for_other_properties() {
        let id = RemoteControlId::new(5);
        let cases = [
            (StripValue::Mute(1.0), "/strip/mute"),
            (StripValue::Solo(0.0), "/strip/solo"),
            (StripValue::RecEnable(1.0), "/strip/recenable"),
        ];
        for (value, path) in cases {
            // Gain mode must not affect non-gain properties.
            for mode in [GainMode::Absolute, GainMode::Db, GainMode::Fader1024] {
                let msg = encode(id, &value, mode);
                assert_eq!(msg.addr, path);
                assert_eq!(msg.args[0], OscType::Int(5));
            }
        }

        let name = encode(id, &StripValue::Name("Kick".into()), GainMode::Db);
        assert_eq!(name.addr, "/strip/name");
        assert_eq!(name.args, vec![OscType::Int(5), OscType::String("Kick".into())]);
    }
}

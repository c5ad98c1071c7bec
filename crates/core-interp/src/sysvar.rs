//! System-variable resolution: numeric selectors written `%(N)` in source.
//!
//! Positions come from the status mirror (driver-reported), speeds from the
//! runtime's settings record. Selectors outside the known table are an
//! error; the legacy dialect reserves them for machine models this runtime
//! does not emulate.

use crate::eval::EvalError;
use crate::status::MachineStatus;
use core_config::DriveSettings;

pub fn resolve(
    selector: u32,
    status: &MachineStatus,
    settings: &DriveSettings,
) -> Result<f64, EvalError> {
    let value = match selector {
        1 => status.posx,
        2 => status.posy,
        3 => status.posz,
        4 => status.posa,
        5 => status.posb,
        71 | 72 => settings.movexy_speed,
        73 => settings.movez_speed,
        74 => settings.movea_speed,
        75 => settings.moveb_speed,
        76 => settings.movec_speed,
        144 => status.posc,
        other => return Err(EvalError::UnknownSysVar(other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_come_from_the_mirror() {
        let status = MachineStatus {
            posx: 7.5,
            posb: -1.0,
            posc: 42.0,
            ..MachineStatus::default()
        };
        let settings = DriveSettings::default();
        assert_eq!(resolve(1, &status, &settings).unwrap(), 7.5);
        assert_eq!(resolve(5, &status, &settings).unwrap(), -1.0);
        assert_eq!(resolve(144, &status, &settings).unwrap(), 42.0);
    }

    #[test]
    fn speed_selectors_read_settings() {
        let status = MachineStatus::default();
        let mut settings = DriveSettings::default();
        settings.movexy_speed = 5.0;
        settings.movec_speed = 0.5;
        assert_eq!(resolve(71, &status, &settings).unwrap(), 5.0);
        assert_eq!(resolve(72, &status, &settings).unwrap(), 5.0);
        assert_eq!(resolve(76, &status, &settings).unwrap(), 0.5);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let status = MachineStatus::default();
        let settings = DriveSettings::default();
        assert!(matches!(
            resolve(999, &status, &settings),
            Err(EvalError::UnknownSysVar(999))
        ));
    }
}

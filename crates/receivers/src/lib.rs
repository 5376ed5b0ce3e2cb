//! rg-pipe-receivers: Built-in receivers for rg-pipe.
//!
//! Each receiver is a thin wrapper around one information source. The
//! registry is built explicitly from [`builtin_receivers`] at startup.

mod battery;
mod bspwm;
mod date;
mod format;
mod mpd;
mod owm;
mod sys;
mod transmission;

#[cfg(test)]
mod test_http;

pub use battery::{BatteryReceiver, BatteryResponse};
pub use bspwm::{BspwmDesktop, BspwmMonitor, BspwmReceiver, BspwmResponse};
pub use date::DateReceiver;
pub use format::bytonize;
pub use mpd::{MpdReceiver, MpdResponse};
pub use owm::{OwmReceiver, OwmResponse};
pub use sys::{SysReceiver, SysResponse};
pub use transmission::{TransmissionReceiver, TransmissionResponse, TransmissionStats};

use rg_pipe_core::{ReceiverFactory, ReceiverHandle, Registry};
use serde::Serialize;
use serde_json::Value;

fn zero_of<T: Serialize + Default>() -> Value {
    serde_json::to_value(T::default()).unwrap_or(Value::Null)
}

fn date() -> ReceiverHandle {
    ReceiverHandle::polling(DateReceiver::default())
}

fn battery() -> ReceiverHandle {
    ReceiverHandle::polling(BatteryReceiver::default())
}

fn sys() -> ReceiverHandle {
    ReceiverHandle::polling(SysReceiver::default())
}

fn bspwm() -> ReceiverHandle {
    ReceiverHandle::evented(BspwmReceiver::default())
}

fn mpd() -> ReceiverHandle {
    ReceiverHandle::polling(MpdReceiver::default())
}

fn owm() -> ReceiverHandle {
    ReceiverHandle::polling(OwmReceiver::default())
}

fn transmission() -> ReceiverHandle {
    ReceiverHandle::polling(TransmissionReceiver::default())
}

/// The fixed `(name, factory, zero value)` table of built-in receivers
pub fn builtin_receivers() -> Vec<(&'static str, ReceiverFactory, Value)> {
    vec![
        ("date", date as ReceiverFactory, Value::from("")),
        ("battery", battery as ReceiverFactory, zero_of::<BatteryResponse>()),
        ("sys", sys as ReceiverFactory, zero_of::<SysResponse>()),
        ("bspwm", bspwm as ReceiverFactory, zero_of::<BspwmResponse>()),
        ("mpd", mpd as ReceiverFactory, zero_of::<MpdResponse>()),
        ("owm", owm as ReceiverFactory, zero_of::<OwmResponse>()),
        (
            "transmission",
            transmission as ReceiverFactory,
            zero_of::<TransmissionResponse>(),
        ),
    ]
}

/// Build a registry holding every built-in receiver
pub fn registry() -> Registry {
    Registry::from_table(builtin_receivers())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rg_pipe_core::ReceiverKind;

    #[test]
    fn test_all_builtins_are_registered() {
        let registry = registry();
        assert_eq!(
            registry.list_receivers(),
            vec!["battery", "bspwm", "date", "mpd", "owm", "sys", "transmission"]
        );

        for name in ["Date", "BATTERY", "sys", "Bspwm", "mpd", "Owm", "Transmission"] {
            assert!(registry.get_receiver(name).is_ok(), "{} missing", name);
            assert!(registry.get_zero(name).is_ok(), "{} zero missing", name);
        }
    }

    #[test]
    fn test_capability_profiles() {
        let registry = registry();
        assert_eq!(
            registry.create_receiver("bspwm").unwrap().kind(),
            ReceiverKind::Evented
        );
        for name in ["date", "owm", "transmission"] {
            assert_eq!(
                registry.create_receiver(name).unwrap().kind(),
                ReceiverKind::Polling
            );
        }
    }

    #[test]
    fn test_zero_values_have_template_fields() {
        let registry = registry();
        let battery = registry.get_zero("battery").unwrap();
        assert_eq!(battery["percent"], 0.0);
        assert_eq!(battery["state"], "");
        assert!(registry.get_zero("bspwm").unwrap()["monitors"].is_array());
        assert_eq!(registry.get_zero("owm").unwrap()["city"], "");
        assert_eq!(
            registry.get_zero("transmission").unwrap()["cumulative"]["uploaded"],
            ""
        );
    }
}

//! Return code lookup tables.

use super::ErrorClass;

/// An entry in a return code lookup table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    /// The name of the return code.
    pub name: &'static str,
    /// A human readable description of the failure.
    pub message: &'static str,
    /// The class of failure.
    pub class: ErrorClass,
}

impl Entry {
    /// The entry used for codes missing from a table.
    pub const UNRECOGNIZED: Entry = Entry {
        name: "Unrecognized",
        message: "unrecognized return code",
        class: ErrorClass::Communication,
    };
}

macro_rules! define_return_codes {
    // Entry point.
    //
    // Serves to concatenate the parts of the name before defining the constants.
    (
        $(#[$attr:meta])*
        pub mod $module:ident {
            $(
                $num:literal: $($name_word:ident)+ => $class:ident, $message:literal
            ),+
            $(,)?
        }
    ) => {
        paste::paste! {
            define_return_codes!{@with_concatenated_name
                $(#[$attr])*
                $module,
                $(
                    $num: $($name_word)+, [< $($name_word:camel)+ >], $class, $message
                ),+
            }
        }
    };
    (@with_concatenated_name
        $(#[$attr:meta])*
        $module:ident,
        $(
            $num:literal: $($name_word:ident)+, $name:ident, $class:ident, $message:literal
        ),+
    ) => {
        paste::paste! {
            $(#[$attr])*
            pub mod $module {
                use super::{Entry, ErrorClass};

                $(
                    #[doc = $(" " $name_word)+ ": " $message "." ]
                    pub const [< $name:snake:upper >] : i32 = $num;
                )+

                /// Look up the table entry for a return code.
                ///
                /// If the return code is not recognized, `None` is returned.
                pub const fn lookup(code: i32) -> Option<Entry> {
                    match code {
                        $(
                            $num => Some(Entry {
                                name: stringify!($($name_word)+),
                                message: $message,
                                class: ErrorClass::$class,
                            }),
                        )+
                        _ => None,
                    }
                }

                /// Get the name of a return code.
                ///
                /// If the return code is not recognized, `None` is returned.
                /// The contents of the returned string may change.
                pub const fn name(code: i32) -> Option<&'static str> {
                    match lookup(code) {
                        Some(entry) => Some(entry.name),
                        None => None,
                    }
                }
            }
        }
    };
}

define_return_codes! {
    /// Return codes of the scan controller service.
    pub mod controller_code {
        1: Unknown Error => Communication, "Unknown / other error",
        2: Communication Timeout => Communication, "Communication timeout",
        4: No Device Contact => Communication, "No contact to controller via USB",
        5: Driver Error => Communication, "Error when calling USB driver",
        6: Boot Image Missing => Resource, "Controller boot image not found",
        7: Server Missing => Resource, "Server executable not found",
        8: No Server Contact => Communication, "No contact to the server",
        9: Invalid Parameter => Configuration, "Invalid parameter in function call",
        10: Invalid Thread Context => Configuration, "Call in invalid thread context",
        11: Invalid Profile Format => Configuration, "Invalid format of profile file",
        12: File Open Failure => Resource, "Can't open specified file",
    }
}

define_return_codes! {
    /// Return codes of the closed-loop positioner library.
    pub mod positioner_code {
        -1: Unspecific Error => Communication, "Unknown / other error",
        1: Timeout => Communication, "Timeout during data retrieval",
        2: Not Connected => Communication, "No contact with the positioner via USB",
        3: Driver Error => Communication, "Error in the driver response",
        7: Device Locked => Resource, "The device is already in use",
        8: Unknown Error => Communication, "Unknown error",
        9: No Device => Configuration, "Invalid device number used in call",
        10: No Axis => Configuration, "Invalid axis number in function call",
        11: Out Of Range => Configuration, "Parameter in call is out of range",
        12: Not Available => Configuration, "Function not available for device type",
        13: File Error => Resource, "Error opening or interpreting a file",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn controller_code_names() {
        assert_eq!(controller_code::COMMUNICATION_TIMEOUT, 2);
        assert_eq!(controller_code::FILE_OPEN_FAILURE, 12);
        assert_eq!(
            controller_code::name(controller_code::BOOT_IMAGE_MISSING),
            Some("Boot Image Missing")
        );
        assert_eq!(controller_code::name(0), None);
        assert_eq!(controller_code::name(3), None);
    }

    #[test]
    fn positioner_code_names() {
        assert_eq!(positioner_code::UNSPECIFIC_ERROR, -1);
        assert_eq!(positioner_code::name(positioner_code::NO_AXIS), Some("No Axis"));
        let entry = positioner_code::lookup(positioner_code::DEVICE_LOCKED).unwrap();
        assert_eq!(entry.class, ErrorClass::Resource);
        assert_eq!(positioner_code::lookup(42), None);
    }
}

#![deny(unused_must_use)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

#[macro_export]
macro_rules! define_error {
    ( $Error:ident; $( $Option:ident = $description:expr ),+ ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $Error {
            $(
            $Option,
            )*
        }

        impl std::error::Error for $Error {}

        impl std::fmt::Display for $Error {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $(
                        $Error::$Option => write!(f, $description),
                    )*
                }
            }
        }
    };
}

pub mod misc;
pub mod error;
pub mod config;
pub mod ciphers;
pub mod secrets;
pub mod validation;
pub mod staging;
pub mod upstream;
pub mod handoff;

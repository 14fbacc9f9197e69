//! # Closed Protocol Enumerations
//!
//! Every enumeration has an explicit `Unspecified` zero value. On the binary wire
//! the integer discriminant is used (proto names carry a fixed prefix, e.g.
//! `EXCHANGE_ICE`); on the JSON wire the lower-case bare name is used (`ice`).

use std::fmt;
use std::str::FromStr;

use crate::error::OtcError;

/// Declares a protocol enum together with its binary and JSON wire names.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl $name {
            /// All variants in wire order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The lower-case JSON wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// The prefixed binary schema name (e.g. `EXCHANGE_ICE`).
            pub fn proto_name(&self) -> String {
                format!("{}_{}", $prefix, self.as_str().to_ascii_uppercase())
            }

            /// Maps a binary wire integer, tolerating values from newer servers.
            pub fn from_proto(value: i32) -> Self {
                Self::try_from(value).unwrap_or($name::Unspecified)
            }

            /// The binary wire integer.
            pub fn to_proto(self) -> i32 {
                self as i32
            }

            /// Maps a JSON wire name, tolerating values from newer servers.
            pub fn from_wire(value: &str) -> Self {
                value.parse().unwrap_or($name::Unspecified)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = OtcError;

            /// Case-insensitive; accepts either the bare or the prefixed name.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                let prefix = concat!($prefix, "_").to_ascii_lowercase();
                let bare = lower.strip_prefix(prefix.as_str()).unwrap_or(lower.as_str());
                match bare {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(OtcError::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

wire_enum! {
    /// Venue on which a tradable symbol is quoted.
    Exchange, "EXCHANGE" {
        Unspecified = 0 => "unspecified",
        Ice = 1 => "ice",
        Cme = 2 => "cme",
    }
}

wire_enum! {
    /// Request method; selects the populated request payload.
    Method, "METHOD" {
        Unspecified = 0 => "unspecified",
        Auth = 1 => "auth",
        Order = 2 => "order",
        Subscribe = 3 => "subscribe",
        Unsubscribe = 4 => "unsubscribe",
    }
}

wire_enum! {
    /// Category of unsolicited server-pushed messages.
    Channel, "CHANNEL" {
        Unspecified = 0 => "unspecified",
        ServerInfo = 1 => "server_info",
        Tickers = 2 => "tickers",
        Orders = 3 => "orders",
        OrderBookTop = 4 => "order_book_top",
        Rfq = 5 => "rfq",
    }
}

wire_enum! {
    OrderType, "ORDER_TYPE" {
        Unspecified = 0 => "unspecified",
        FillOrKill = 1 => "fill_or_kill",
    }
}

wire_enum! {
    Side, "SIDE" {
        Unspecified = 0 => "unspecified",
        Buy = 1 => "buy",
        Sell = 2 => "sell",
    }
}

wire_enum! {
    /// Outcome carried by a subscription acknowledgement.
    SubscriptionStatus, "SUBSCRIPTION_STATUS" {
        Unspecified = 0 => "unspecified",
        Subscribed = 1 => "subscribed",
        Unsubscribed = 2 => "unsubscribed",
    }
}

wire_enum! {
    /// Error codes of structured server error responses.
    OtcErrorCode, "OTC_ERROR_CODE" {
        Unspecified = 0 => "unspecified",
        InvalidRequest = 1 => "invalid_request",
        NotImplemented = 2 => "not_implemented",
        Unauthenticated = 3 => "unauthenticated",
        TooManyRequests = 4 => "too_many_requests",
        NotSubscribed = 5 => "not_subscribed",
        Forbidden = 6 => "forbidden",
        InternalServerError = 7 => "internal_server_error",
    }
}

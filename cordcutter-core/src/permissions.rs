//! Permission bit flags
//!
//! Role and overwrite payloads carry permissions as an integer bit set.

use bitflags::bitflags;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Gateway permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        /// Create instant invites
        const CREATE_INSTANT_INVITE = 0x0000_0001;
        /// Kick members
        const KICK_MEMBERS          = 0x0000_0002;
        /// Ban members
        const BAN_MEMBERS           = 0x0000_0004;
        /// Bypass all permission checks
        const ADMINISTRATOR         = 0x0000_0008;
        /// Create, edit and delete channels
        const MANAGE_CHANNELS       = 0x0000_0010;
        /// Edit guild settings
        const MANAGE_GUILD          = 0x0000_0020;
        /// Add reactions to messages
        const ADD_REACTIONS         = 0x0000_0040;
        /// Read messages
        const READ_MESSAGES         = 0x0000_0400;
        /// Send messages
        const SEND_MESSAGES         = 0x0000_0800;
        /// Send text-to-speech messages
        const SEND_TTS_MESSAGES     = 0x0000_1000;
        /// Delete other users' messages
        const MANAGE_MESSAGES       = 0x0000_2000;
        /// Links get embedded
        const EMBED_LINKS           = 0x0000_4000;
        /// Upload files
        const ATTACH_FILES          = 0x0000_8000;
        /// Read message history
        const READ_MESSAGE_HISTORY  = 0x0001_0000;
        /// Mention @everyone
        const MENTION_EVERYONE      = 0x0002_0000;
        /// Use emojis from other guilds
        const USE_EXTERNAL_EMOJIS   = 0x0004_0000;
        /// Connect to voice channels
        const CONNECT               = 0x0010_0000;
        /// Speak in voice channels
        const SPEAK                 = 0x0020_0000;
        /// Mute members in voice channels
        const MUTE_MEMBERS          = 0x0040_0000;
        /// Deafen members in voice channels
        const DEAFEN_MEMBERS        = 0x0080_0000;
        /// Move members between voice channels
        const MOVE_MEMBERS          = 0x0100_0000;
        /// Use voice activity detection
        const USE_VAD               = 0x0200_0000;
        /// Change own nickname
        const CHANGE_NICKNAME       = 0x0400_0000;
        /// Change other members' nicknames
        const MANAGE_NICKNAMES      = 0x0800_0000;
        /// Manage roles below own highest role
        const MANAGE_ROLES          = 0x1000_0000;
        /// Manage webhooks
        const MANAGE_WEBHOOKS       = 0x2000_0000;
        /// Manage custom emojis
        const MANAGE_EMOJIS         = 0x4000_0000;
    }
}

impl Permissions {
    /// Check if the set grants a permission. Administrators hold every permission.
    #[inline]
    pub fn has(&self, permission: Permissions) -> bool {
        self.contains(Permissions::ADMINISTRATOR) || self.contains(permission)
    }

    /// Names of the flags that are set
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PermissionsVisitor;

        impl Visitor<'_> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a permission bit set as an integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Permissions, E> {
                Ok(Permissions::from_bits_truncate(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Permissions, E> {
                u64::try_from(value)
                    .map(Permissions::from_bits_truncate)
                    .map_err(|_| E::custom(format!("negative permission bits {}", value)))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Permissions, E> {
                value
                    .parse::<u64>()
                    .map(Permissions::from_bits_truncate)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

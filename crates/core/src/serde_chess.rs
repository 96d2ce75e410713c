//! Serde adapters for shakmaty types.
//!
//! Squares are written as `"e4"`, roles as their lowercase letter (`"q"`),
//! colors as `"white"` / `"black"`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use shakmaty::{Color, Role, Square};

fn parse_role<E: serde::de::Error>(raw: &str) -> Result<Role, E> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Role::from_char(c.to_ascii_lowercase())
            .ok_or_else(|| E::custom(format!("unknown piece role '{raw}'"))),
        _ => Err(E::custom(format!("unknown piece role '{raw}'"))),
    }
}

fn parse_color<E: serde::de::Error>(raw: &str) -> Result<Color, E> {
    match raw {
        "white" | "w" => Ok(Color::White),
        "black" | "b" => Ok(Color::Black),
        other => Err(E::custom(format!("unknown color '{other}'"))),
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

pub mod square {
    use super::*;

    pub fn serialize<S: Serializer>(square: &Square, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(square)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Square, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(|_| D::Error::custom(format!("invalid square '{raw}'")))
    }
}

pub mod role {
    use super::*;

    pub fn serialize<S: Serializer>(role: &Role, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&role.char())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Role, D::Error> {
        let raw = String::deserialize(d)?;
        parse_role(&raw)
    }
}

pub mod opt_role {
    use super::*;

    pub fn serialize<S: Serializer>(role: &Option<Role>, s: S) -> Result<S::Ok, S::Error> {
        match role {
            Some(role) => s.collect_str(&role.char()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Role>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse_role(&raw).map(Some),
            None => Ok(None),
        }
    }
}

pub mod color {
    use super::*;

    pub fn serialize<S: Serializer>(color: &Color, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(color_name(*color))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
        let raw = String::deserialize(d)?;
        parse_color(&raw)
    }
}

pub mod opt_color {
    use super::*;

    pub fn serialize<S: Serializer>(color: &Option<Color>, s: S) -> Result<S::Ok, S::Error> {
        match color {
            Some(color) => s.serialize_str(color_name(*color)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse_color(&raw).map(Some),
            None => Ok(None),
        }
    }
}

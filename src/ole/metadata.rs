use super::consts::*;
use super::file::{OleError, OleFile};
use crate::common::binary::{read_u16_le, read_u32_le, read_u64_le, utf16le_units};
use crate::common::encoding::decode_codepage;
use std::collections::HashMap;
use std::io::{Read, Seek};

/// Property ids shared by the summary information property sets.
pub mod pid {
    pub const CODEPAGE: u32 = 1;
    pub const TITLE: u32 = 2;
    pub const SUBJECT: u32 = 3;
    pub const AUTHOR: u32 = 4;
    pub const KEYWORDS: u32 = 5;
    pub const COMMENTS: u32 = 6;
    pub const LAST_SAVED_BY: u32 = 8;
    pub const REVISION: u32 = 9;
    pub const CREATE_TIME: u32 = 12;
    pub const LAST_SAVED_TIME: u32 = 13;
    pub const NUM_PAGES: u32 = 14;
    pub const NUM_WORDS: u32 = 15;
    pub const NUM_CHARS: u32 = 16;
    pub const APPLICATION: u32 = 18;
    /// DocumentSummaryInformation only
    pub const CATEGORY: u32 = 2;
}

/// Property value types
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    I2(i16),
    I4(i32),
    UI2(u16),
    UI4(u32),
    Bool(bool),
    Lpstr(String),
    Lpwstr(String),
    Filetime(u64),
    Empty,
}

impl PropertyValue {
    /// Non-empty string content, if this is a string property.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Lpstr(s) | PropertyValue::Lpwstr(s) => {
                let s = s.trim();
                (!s.is_empty()).then_some(s)
            },
            _ => None,
        }
    }

    /// Integer content, if this is a numeric property.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            PropertyValue::I2(v) => u32::try_from(v).ok(),
            PropertyValue::I4(v) => u32::try_from(v).ok(),
            PropertyValue::UI2(v) => Some(v as u32),
            PropertyValue::UI4(v) => Some(v),
            _ => None,
        }
    }
}

/// Properties of the first section of one property set stream.
pub type PropertySet = HashMap<u32, PropertyValue>;

impl<R: Read + Seek> OleFile<R> {
    /// Read and parse a property set stream such as `\u{5}SummaryInformation`.
    pub fn property_set(&mut self, stream: &str) -> Result<PropertySet, OleError> {
        let data = self.open_stream(&[stream])?;
        parse_property_stream(&data)
    }
}

/// Parse a property stream and return properties as a HashMap
///
/// Property streams contain metadata in a structured format according
/// to [MS-OLEPS] specification. Only the first section is read.
pub fn parse_property_stream(data: &[u8]) -> Result<PropertySet, OleError> {
    if data.len() < 48 {
        return Err(OleError::InvalidFormat(
            "Property stream too short".to_string(),
        ));
    }

    // Skip header (28 bytes) and format ID (16 bytes)
    let section_offset = read_u32_le(data, 44)? as usize;
    let num_props = read_u32_le(data, section_offset.saturating_add(4))
        .map_err(|_| OleError::InvalidFormat("Invalid section offset".to_string()))?
        .min(MAX_PROPERTIES);

    // Locate the codepage first so that string properties decode correctly
    let mut entries = Vec::with_capacity(num_props as usize);
    let mut codepage = None;
    for i in 0..num_props as usize {
        let prop_offset = section_offset + 8 + i * 8;
        let (Ok(prop_id), Ok(relative)) = (
            read_u32_le(data, prop_offset),
            read_u32_le(data, prop_offset + 4),
        ) else {
            break;
        };
        let value_offset = section_offset.saturating_add(relative as usize);
        if prop_id == pid::CODEPAGE
            && let Ok(PropertyValue::UI2(cp)) =
                parse_property_value(data, value_offset, None).map(normalize_codepage)
        {
            codepage = Some(cp as u32);
        }
        entries.push((prop_id, value_offset));
    }

    let mut properties = HashMap::new();
    for (prop_id, value_offset) in entries {
        if let Ok(value) = parse_property_value(data, value_offset, codepage) {
            properties.insert(prop_id, value);
        }
    }

    Ok(properties)
}

/// Codepages are stored as VT_I2; 1200 and 65001 do not fit an i16.
fn normalize_codepage(value: PropertyValue) -> PropertyValue {
    match value {
        PropertyValue::I2(v) => PropertyValue::UI2(v as u16),
        other => other,
    }
}

/// Parse a single typed property value at `offset`.
fn parse_property_value(
    data: &[u8],
    offset: usize,
    codepage: Option<u32>,
) -> Result<PropertyValue, OleError> {
    let prop_type = read_u16_le(data, offset)?;
    let offset = offset + 4;

    let value = match prop_type {
        VT_I2 => PropertyValue::I2(read_u16_le(data, offset)? as i16),
        VT_I4 | VT_INT | VT_ERROR => PropertyValue::I4(read_u32_le(data, offset)? as i32),
        VT_UI2 => PropertyValue::UI2(read_u16_le(data, offset)?),
        VT_UI4 | VT_UINT => PropertyValue::UI4(read_u32_le(data, offset)?),
        VT_BOOL => PropertyValue::Bool(read_u16_le(data, offset)? != 0),
        VT_FILETIME => PropertyValue::Filetime(read_u64_le(data, offset)?),
        VT_LPSTR | VT_BSTR => {
            let len = read_u32_le(data, offset)? as usize;
            let bytes = data
                .get(offset + 4..(offset + 4).saturating_add(len))
                .ok_or_else(|| OleError::InvalidFormat("String overflow".to_string()))?;
            // A UTF-16 codepage turns LPSTR into wide text
            if codepage == Some(1200) {
                PropertyValue::Lpstr(decode_wide(bytes))
            } else {
                PropertyValue::Lpstr(decode_codepage(bytes, codepage))
            }
        },
        VT_LPWSTR => {
            let char_count = read_u32_le(data, offset)? as usize;
            let bytes = data
                .get(offset + 4..(offset + 4).saturating_add(char_count.saturating_mul(2)))
                .ok_or_else(|| OleError::InvalidFormat("String overflow".to_string()))?;
            PropertyValue::Lpwstr(decode_wide(bytes))
        },
        // VT_EMPTY, VT_NULL and unsupported types
        _ => PropertyValue::Empty,
    };

    Ok(value)
}

fn decode_wide(bytes: &[u8]) -> String {
    let units = utf16le_units(bytes).take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use hwpscan::EngineConfig;

pub const SECTOR: usize = 512;
const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const FATSECT: u32 = 0xFFFF_FFFD;
const NOSTREAM: u32 = 0xFFFF_FFFF;
const OLE_MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

pub const VT_I4: u16 = 3;
pub const VT_LPSTR: u16 = 30;
pub const VT_LPWSTR: u16 = 31;
pub const VT_FILETIME: u16 = 64;

pub const PID_TITLE: u32 = 2;
pub const PID_SUBJECT: u32 = 3;
pub const PID_AUTHOR: u32 = 4;
pub const PID_CREATE_TIME: u32 = 12;

pub const PARA_HEADER: u16 = 66;
pub const PARA_TEXT: u16 = 67;
pub const TABLE: u16 = 77;

/// Engine configuration without external tools, so results do not
/// depend on what is installed.
pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        external_tools: vec![],
        ..EngineConfig::default()
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    path
}

pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// A 256-byte file header: signature, version at 32, flags at 36.
pub fn file_header(version: u32, flags: u32) -> Vec<u8> {
    let mut header = vec![0u8; 256];
    header[..17].copy_from_slice(b"HWP Document File");
    header[32..36].copy_from_slice(&version.to_le_bytes());
    header[36..40].copy_from_slice(&flags.to_le_bytes());
    header
}

/// One TLV token: 4-byte tag, u32 length, payload.
pub fn token(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// A proprietary record-stream file holding `body` after the header.
pub fn proprietary(flags: u32, body: &[u8]) -> Vec<u8> {
    let mut data = file_header(0x0500_0000, flags);
    data.extend_from_slice(body);
    data
}

/// One HWP 5 body record.
pub fn hwp5_record(tag: u16, level: u16, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u32;
    let short = size.min(0xFFF);
    let header = (tag as u32 & 0x3FF) | ((level as u32 & 0x3FF) << 10) | (short << 20);
    let mut out = header.to_le_bytes().to_vec();
    if short == 0xFFF {
        out.extend_from_slice(&size.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// A body section with one paragraph per line of `text`.
pub fn hwp5_section(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for line in text.lines() {
        out.extend(hwp5_record(PARA_HEADER, 0, &[0u8; 22]));
        let mut payload = utf16(line);
        payload.extend_from_slice(&13u16.to_le_bytes());
        out.extend(hwp5_record(PARA_TEXT, 1, &payload));
    }
    out
}

pub fn raw_deflate(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::DeflateEncoder;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A property set stream with one section.
pub fn property_stream(props: &[(u32, u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xFFFEu16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&48u32.to_le_bytes());

    let header_len = 8 + props.len() * 8;
    let mut values = Vec::new();
    let mut index = Vec::new();
    for (id, vt, payload) in props {
        index.push((*id, (header_len + values.len()) as u32));
        values.extend_from_slice(&vt.to_le_bytes());
        values.extend_from_slice(&[0, 0]);
        values.extend_from_slice(payload);
        while values.len() % 4 != 0 {
            values.push(0);
        }
    }

    out.extend_from_slice(&((header_len + values.len()) as u32).to_le_bytes());
    out.extend_from_slice(&(props.len() as u32).to_le_bytes());
    for (id, offset) in index {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&values);
    out
}

pub fn lpstr(s: &str) -> Vec<u8> {
    let mut v = ((s.len() + 1) as u32).to_le_bytes().to_vec();
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    v
}

pub fn lpwstr(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().chain(std::iter::once(0)).collect();
    let mut v = (units.len() as u32).to_le_bytes().to_vec();
    v.extend(units.iter().flat_map(|u| u.to_le_bytes()));
    v
}

fn chain(start: usize, len: usize, fat: &mut [u32]) {
    for s in start..start + len {
        fat[s] = if s + 1 == start + len {
            ENDOFCHAIN
        } else {
            (s + 1) as u32
        };
    }
}

struct DirEntry {
    name: String,
    kind: u8,
    data: Vec<u8>,
    children: Vec<usize>,
    start: u32,
}

/// Build a version 3 compound file from `(path, data)` streams.
///
/// Paths are one or two levels deep (`"FileHeader"`, `"BodyText/Section0"`).
/// The mini stream cutoff is 0, so every stream lives in regular sectors.
/// Siblings are linked through their right pointers.
pub fn ole_file(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut entries = vec![DirEntry {
        name: "Root Entry".to_string(),
        kind: 5,
        data: Vec::new(),
        children: Vec::new(),
        start: ENDOFCHAIN,
    }];

    for (path, data) in streams {
        let parts: Vec<&str> = path.split('/').collect();
        let mut parent = 0;
        for storage in &parts[..parts.len() - 1] {
            let existing = entries[parent]
                .children
                .iter()
                .copied()
                .find(|&i| entries[i].name == *storage);
            parent = match existing {
                Some(i) => i,
                None => {
                    entries.push(DirEntry {
                        name: storage.to_string(),
                        kind: 1,
                        data: Vec::new(),
                        children: Vec::new(),
                        start: 0,
                    });
                    let i = entries.len() - 1;
                    entries[parent].children.push(i);
                    i
                },
            };
        }
        entries.push(DirEntry {
            name: parts[parts.len() - 1].to_string(),
            kind: 2,
            data: data.clone(),
            children: Vec::new(),
            start: ENDOFCHAIN,
        });
        let i = entries.len() - 1;
        entries[parent].children.push(i);
    }

    let dir_sectors = (entries.len() * 128).div_ceil(SECTOR);
    let data_sectors: usize = entries.iter().map(|e| e.data.len().div_ceil(SECTOR)).sum();
    let mut fat_sectors = 1;
    while fat_sectors * (SECTOR / 4) < fat_sectors + dir_sectors + data_sectors {
        fat_sectors += 1;
    }

    let total = fat_sectors + dir_sectors + data_sectors;
    let mut fat = vec![FREESECT; fat_sectors * (SECTOR / 4)];
    for entry in fat.iter_mut().take(fat_sectors) {
        *entry = FATSECT;
    }
    let dir_start = fat_sectors;
    chain(dir_start, dir_sectors, &mut fat);

    let mut next = dir_start + dir_sectors;
    for entry in entries.iter_mut() {
        let len = entry.data.len().div_ceil(SECTOR);
        if entry.kind == 2 && len > 0 {
            entry.start = next as u32;
            chain(next, len, &mut fat);
            next += len;
        }
    }

    let mut out = vec![0u8; SECTOR * (total + 1)];
    out[..8].copy_from_slice(OLE_MAGIC);
    out[0x18..0x1A].copy_from_slice(&0x3Eu16.to_le_bytes());
    out[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
    out[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
    out[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
    out[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
    out[0x2C..0x30].copy_from_slice(&(fat_sectors as u32).to_le_bytes());
    out[0x30..0x34].copy_from_slice(&(dir_start as u32).to_le_bytes());
    out[0x38..0x3C].copy_from_slice(&0u32.to_le_bytes());
    out[0x3C..0x40].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    out[0x40..0x44].copy_from_slice(&0u32.to_le_bytes());
    out[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    out[0x48..0x4C].copy_from_slice(&0u32.to_le_bytes());
    for i in 0..109 {
        let value = if i < fat_sectors { i as u32 } else { FREESECT };
        out[0x4C + i * 4..0x50 + i * 4].copy_from_slice(&value.to_le_bytes());
    }

    let sector_at = |id: usize| SECTOR * (id + 1);
    for (i, value) in fat.iter().enumerate() {
        let off = sector_at(0) + i * 4;
        out[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    for (i, entry) in entries.iter().enumerate() {
        let off = sector_at(dir_start) + i * 128;
        let raw = &mut out[off..off + 128];
        let name: Vec<u16> = entry.name.encode_utf16().collect();
        for (j, unit) in name.iter().enumerate() {
            raw[j * 2..j * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        raw[64..66].copy_from_slice(&(((name.len() + 1) * 2) as u16).to_le_bytes());
        raw[66] = entry.kind;
        raw[67] = 1;

        // Right sibling: the next child of the same parent
        let right = entries
            .iter()
            .find_map(|p| {
                let pos = p.children.iter().position(|&c| c == i)?;
                Some(p.children.get(pos + 1).map_or(NOSTREAM, |&c| c as u32))
            })
            .unwrap_or(NOSTREAM);
        let child = entry.children.first().map_or(NOSTREAM, |&c| c as u32);
        raw[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
        raw[72..76].copy_from_slice(&right.to_le_bytes());
        raw[76..80].copy_from_slice(&child.to_le_bytes());
        raw[116..120].copy_from_slice(&entry.start.to_le_bytes());
        raw[120..128].copy_from_slice(&(entry.data.len() as u64).to_le_bytes());
    }

    for entry in &entries {
        if entry.kind == 2 && !entry.data.is_empty() {
            let off = sector_at(entry.start as usize);
            out[off..off + entry.data.len()].copy_from_slice(&entry.data);
        }
    }

    out
}

/// A ZIP archive from `(name, data)` entries.
#[cfg(feature = "ooxml")]
pub fn zip_file(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use super::consts::*;
use crate::common::binary::{BinaryError, parse_utf16le_string};

/// Number of FAT sector ids stored in the header itself.
const HEADER_DIFAT_LEN: usize = 109;

/// On-disk compound file header (512 bytes).
#[derive(DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 8],
    _clsid: [u8; 16],
    _minor_version: U16<LE>,
    major_version: U16<LE>,
    byte_order: U16<LE>,
    sector_shift: U16<LE>,
    mini_sector_shift: U16<LE>,
    _reserved: [u8; 6],
    _dir_sector_count: U32<LE>,
    _fat_sector_count: U32<LE>,
    first_dir_sector: U32<LE>,
    _transaction: U32<LE>,
    mini_stream_cutoff: U32<LE>,
    first_minifat_sector: U32<LE>,
    minifat_sector_count: U32<LE>,
    first_difat_sector: U32<LE>,
    difat_sector_count: U32<LE>,
    difat: [U32<LE>; HEADER_DIFAT_LEN],
}

/// On-disk directory entry (128 bytes).
#[derive(DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// UTF-16LE, null-padded
    name: [u8; 64],
    /// Bytes, including the terminator
    name_len: U16<LE>,
    entry_type: u8,
    _color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    _clsid: [u8; 16],
    _state_bits: U32<LE>,
    _created: U64<LE>,
    _modified: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// Read-only OLE2 structured storage.
///
/// Every chain walk is bounded by the size of its allocation table, so a
/// corrupt or cyclic FAT is reported as [`OleError::CorruptedFile`]
/// instead of looping. Stream reads never allocate more than the file
/// holds.
#[derive(Debug)]
pub struct OleFile<R: Read + Seek> {
    reader: R,
    file_size: u64,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    root: Option<DirectoryEntry>,
    /// Indexed by SID; `None` for entries not reachable from the root
    entries: Vec<Option<DirectoryEntry>>,
    /// Loaded on first mini-stream read
    ministream: Option<Vec<u8>>,
}

/// A stream or storage entry of the directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub sid: u32,
    pub name: String,
    pub entry_type: u8,
    pub sid_left: u32,
    pub sid_right: u32,
    pub sid_child: u32,
    pub start_sector: u32,
    pub size: u64,
    /// Stored in the mini stream rather than regular sectors
    pub is_minifat: bool,
}

/// A stream found while walking the directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Storage names leading to the stream, stream name last
    pub path: Vec<String>,
    /// Absolute file offset of the first sector, 0 when unresolvable
    pub offset: u64,
    /// Declared stream size in bytes
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum OleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid compound file: {0}")]
    InvalidFormat(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("not a compound file")]
    NotOleFile,
    #[error("corrupted compound file: {0}")]
    CorruptedFile(String),
    #[error("stream not found")]
    StreamNotFound,
}

impl From<BinaryError> for OleError {
    fn from(err: BinaryError) -> Self {
        OleError::InvalidData(err.to_string())
    }
}

fn corrupt(message: impl Into<String>) -> OleError {
    OleError::CorruptedFile(message.into())
}

fn le_words(data: &[u8]) -> impl Iterator<Item = u32> + '_ {
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

impl<R: Read + Seek> OleFile<R> {
    /// Parse the header, allocation tables and directory of a compound file.
    pub fn open(mut reader: R) -> Result<Self, OleError> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        if file_size < MINIMAL_OLEFILE_SIZE as u64 {
            return Err(OleError::NotOleFile);
        }

        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        let header = RawHeader::read_from_bytes(&bytes)
            .map_err(|_| OleError::InvalidFormat("short header".to_string()))?;
        if &header.magic != MAGIC {
            return Err(OleError::NotOleFile);
        }
        if header.byte_order.get() != 0xFFFE {
            return Err(OleError::InvalidFormat("byte order mark".to_string()));
        }

        // Only 512 and 4096 byte sectors exist
        let shift = header.sector_shift.get();
        let mini_shift = header.mini_sector_shift.get();
        if !matches!(shift, 9 | 12) || mini_shift > 12 {
            return Err(OleError::InvalidFormat("sector shift".to_string()));
        }
        let sector_size = 1usize << shift;
        match (header.major_version.get(), sector_size) {
            (3, 4096) | (4, 512) => {
                return Err(OleError::InvalidFormat(
                    "sector size does not match version".to_string(),
                ));
            },
            _ => {},
        }

        let mut ole = OleFile {
            reader,
            file_size,
            sector_size,
            mini_sector_size: 1usize << mini_shift,
            mini_stream_cutoff: header.mini_stream_cutoff.get(),
            fat: Vec::new(),
            minifat: Vec::new(),
            root: None,
            entries: Vec::new(),
            ministream: None,
        };

        ole.load_fat(&header)?;
        ole.load_directory(header.first_dir_sector.get())?;
        if header.minifat_sector_count.get() > 0 {
            let data = ole.read_chain(header.first_minifat_sector.get(), None)?;
            ole.minifat = le_words(&data).collect();
        }
        Ok(ole)
    }

    /// Sectors the file physically holds, header excluded.
    fn sector_count(&self) -> u64 {
        (self.file_size / self.sector_size as u64).saturating_sub(1)
    }

    /// FAT sector ids come from the header, then from the DIFAT chain.
    fn load_fat(&mut self, header: &RawHeader) -> Result<(), OleError> {
        let live = |id: &u32| *id != FREESECT && *id != ENDOFCHAIN;
        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .map(|id| id.get())
            .take_while(live)
            .collect();

        let per_sector = self.sector_size / 4 - 1;
        let mut next = header.first_difat_sector.get();
        let budget = (header.difat_sector_count.get() as u64).min(self.sector_count());
        for _ in 0..budget {
            if !live(&next) {
                break;
            }
            let sector = self.read_sector(next)?;
            let words: Vec<u32> = le_words(&sector).collect();
            fat_sectors.extend(words[..per_sector].iter().copied().take_while(live));
            next = words[per_sector];
        }

        self.fat.reserve(fat_sectors.len() * (self.sector_size / 4));
        for id in fat_sectors {
            let sector = self.read_sector(id)?;
            self.fat.extend(le_words(&sector));
        }
        Ok(())
    }

    fn load_directory(&mut self, first_sector: u32) -> Result<(), OleError> {
        let data = self.read_chain(first_sector, None)?;
        let count = data.len() / DIRENTRY_SIZE;
        self.entries = vec![None; count];
        if count == 0 {
            return Ok(());
        }

        let root = self.parse_entry(&data[..DIRENTRY_SIZE], 0)?;
        let first_child = root.sid_child;
        self.root = Some(root);
        self.link_entries(first_child, &data, 0)
    }

    fn parse_entry(&self, data: &[u8], sid: u32) -> Result<DirectoryEntry, OleError> {
        let raw = RawDirectoryEntry::read_from_bytes(data)
            .map_err(|_| OleError::InvalidFormat("directory entry".to_string()))?;

        let name_len = (raw.name_len.get() as usize).saturating_sub(2).min(64);
        // Version 3 files only use the low half of the size field
        let size = match self.sector_size {
            512 => raw.stream_size.get() & 0xFFFF_FFFF,
            _ => raw.stream_size.get(),
        };

        Ok(DirectoryEntry {
            sid,
            name: parse_utf16le_string(&raw.name[..name_len]),
            entry_type: raw.entry_type,
            sid_left: raw.sid_left.get(),
            sid_right: raw.sid_right.get(),
            sid_child: raw.sid_child.get(),
            start_sector: raw.start_sector.get(),
            size,
            is_minifat: raw.entry_type == STGTY_STREAM && size < self.mini_stream_cutoff as u64,
        })
    }

    /// Parse every entry reachable from `sid`.
    ///
    /// Entries already parsed are skipped, which also breaks cycles in
    /// corrupt sibling links.
    fn link_entries(&mut self, sid: u32, data: &[u8], depth: usize) -> Result<(), OleError> {
        // SID 0 is the root and never a child
        if sid == NOSTREAM || sid == 0 {
            return Ok(());
        }
        if depth > MAX_TREE_DEPTH * 8 {
            return Err(corrupt("directory tree too deep"));
        }
        let index = sid as usize;
        if index >= self.entries.len() {
            return Err(corrupt(format!("directory entry {} out of range", sid)));
        }
        if self.entries[index].is_some() {
            return Ok(());
        }

        let offset = index * DIRENTRY_SIZE;
        let entry = self.parse_entry(&data[offset..offset + DIRENTRY_SIZE], sid)?;
        let links = [entry.sid_left, entry.sid_right, entry.sid_child];
        self.entries[index] = Some(entry);
        for link in links {
            self.link_entries(link, data, depth + 1)?;
        }
        Ok(())
    }

    fn read_sector(&mut self, id: u32) -> Result<Vec<u8>, OleError> {
        if id as u64 >= self.sector_count() {
            return Err(corrupt(format!("sector {} beyond end of file", id)));
        }
        let position = (id as u64 + 1) * self.sector_size as u64;
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buffer = vec![0u8; self.sector_size];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Sector ids of the FAT chain starting at `start`.
    fn fat_chain(&self, start: u32) -> Result<Vec<u32>, OleError> {
        let mut chain = Vec::new();
        let mut sector = start;
        while sector != ENDOFCHAIN {
            let next = *self
                .fat
                .get(sector as usize)
                .ok_or_else(|| corrupt(format!("sector {} not in FAT", sector)))?;
            if chain.len() >= self.fat.len() {
                return Err(corrupt("cyclic FAT chain"));
            }
            chain.push(sector);
            sector = next;
        }
        Ok(chain)
    }

    /// Read a regular-sector chain, truncated to `size` when given.
    fn read_chain(&mut self, start: u32, size: Option<u64>) -> Result<Vec<u8>, OleError> {
        let chain = self.fat_chain(start)?;
        let wanted = size.unwrap_or(u64::MAX);
        let mut data = Vec::with_capacity(chain.len() * self.sector_size);
        for id in chain {
            if data.len() as u64 >= wanted {
                break;
            }
            data.extend(self.read_sector(id)?);
        }
        if let Some(size) = size {
            data.truncate(size as usize);
        }
        Ok(data)
    }

    fn read_mini_chain(&mut self, start: u32, size: u64) -> Result<Vec<u8>, OleError> {
        if self.ministream.is_none() {
            let root_start = self
                .root
                .as_ref()
                .map(|r| r.start_sector)
                .ok_or_else(|| corrupt("no root entry"))?;
            self.ministream = Some(self.read_chain(root_start, None)?);
        }
        let ministream = self.ministream.as_deref().unwrap_or_default();

        let mut data = Vec::new();
        let mut sector = start;
        let mut steps = 0usize;
        while sector != ENDOFCHAIN && (data.len() as u64) < size {
            let next = *self
                .minifat
                .get(sector as usize)
                .ok_or_else(|| corrupt(format!("mini sector {} not in MiniFAT", sector)))?;
            steps += 1;
            if steps > self.minifat.len() {
                return Err(corrupt("cyclic MiniFAT chain"));
            }
            let position = sector as usize * self.mini_sector_size;
            let chunk = ministream
                .get(position..position + self.mini_sector_size)
                .ok_or_else(|| corrupt("mini sector out of bounds"))?;
            data.extend_from_slice(chunk);
            sector = next;
        }
        data.truncate(size as usize);
        Ok(data)
    }

    /// Absolute file offset where a stream's data begins.
    fn stream_offset(&self, entry: &DirectoryEntry) -> u64 {
        let sector_size = self.sector_size as u64;
        if !entry.is_minifat {
            return (entry.start_sector as u64 + 1) * sector_size;
        }

        // Mini stream position, mapped through the root chain
        let position = entry.start_sector as u64 * self.mini_sector_size as u64;
        self.root
            .as_ref()
            .and_then(|root| self.fat_chain(root.start_sector).ok())
            .and_then(|chain| chain.get((position / sector_size) as usize).copied())
            .map_or(0, |id| (id as u64 + 1) * sector_size + position % sector_size)
    }

    /// Every stream with its offset and size, in directory order.
    pub fn stream_infos(&self) -> Vec<StreamInfo> {
        let mut streams = Vec::new();
        if let Some(root) = &self.root {
            self.collect_streams(root.sid_child, &[], &mut streams, 0);
        }
        streams
    }

    fn collect_streams(&self, sid: u32, path: &[String], out: &mut Vec<StreamInfo>, depth: usize) {
        if depth > MAX_TREE_DEPTH * 8 {
            return;
        }
        let Some(Some(entry)) = self.entries.get(sid as usize) else {
            return;
        };

        self.collect_streams(entry.sid_left, path, out, depth + 1);
        let mut here = path.to_vec();
        here.push(entry.name.clone());
        match entry.entry_type {
            STGTY_STREAM => out.push(StreamInfo {
                offset: self.stream_offset(entry),
                size: entry.size,
                path: here,
            }),
            STGTY_STORAGE if path.len() < MAX_TREE_DEPTH => {
                self.collect_streams(entry.sid_child, &here, out, depth + 1);
            },
            _ => {},
        }
        self.collect_streams(entry.sid_right, path, out, depth + 1);
    }

    /// Read a whole stream; `path` names storages then the stream,
    /// compared case-insensitively.
    pub fn open_stream(&mut self, path: &[&str]) -> Result<Vec<u8>, OleError> {
        let entry = self.find_entry(path)?;
        if entry.entry_type != STGTY_STREAM {
            return Err(OleError::InvalidFormat(format!("'{}' is not a stream", entry.name)));
        }
        if entry.size > self.file_size {
            return Err(corrupt(format!(
                "stream '{}' declares {} bytes in a {} byte file",
                entry.name, entry.size, self.file_size
            )));
        }

        if entry.is_minifat {
            self.read_mini_chain(entry.start_sector, entry.size)
        } else {
            self.read_chain(entry.start_sector, Some(entry.size))
        }
    }

    fn find_entry(&self, path: &[&str]) -> Result<DirectoryEntry, OleError> {
        let root = self.root.as_ref().ok_or(OleError::StreamNotFound)?;
        let mut current = root;
        for name in path {
            current = self
                .find_child(current.sid_child, name, 0)
                .ok_or(OleError::StreamNotFound)?;
        }
        Ok(current.clone())
    }

    /// Search one sibling tree for `name`.
    fn find_child(&self, sid: u32, name: &str, depth: usize) -> Option<&DirectoryEntry> {
        if depth > MAX_TREE_DEPTH * 8 {
            return None;
        }
        let entry = self.entries.get(sid as usize)?.as_ref()?;
        if entry.name.eq_ignore_ascii_case(name) {
            return Some(entry);
        }
        self.find_child(entry.sid_left, name, depth + 1)
            .or_else(|| self.find_child(entry.sid_right, name, depth + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header() -> Vec<u8> {
        let mut data = vec![0u8; 512 * 3];
        data[..8].copy_from_slice(MAGIC);
        data[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
        data[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
        data[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
        data[0x30..0x34].copy_from_slice(&1u32.to_le_bytes());
        data[0x38..0x3C].copy_from_slice(&4096u32.to_le_bytes());
        data[0x3C..0x40].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
        data[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
        data[0x4C..0x50].copy_from_slice(&0u32.to_le_bytes());
        for i in 1..HEADER_DIFAT_LEN {
            let off = 0x4C + i * 4;
            data[off..off + 4].copy_from_slice(&FREESECT.to_le_bytes());
        }
        data
    }

    fn set_fat(data: &mut [u8], fat: &[u32]) {
        for i in 0..128 {
            let value = fat.get(i).copied().unwrap_or(FREESECT);
            let off = 512 + i * 4;
            data[off..off + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::size_of::<RawHeader>(), HEADER_SIZE);
        assert_eq!(std::mem::size_of::<RawDirectoryEntry>(), DIRENTRY_SIZE);
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(matches!(
            OleFile::open(Cursor::new(vec![0u8; 100])),
            Err(OleError::NotOleFile)
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(matches!(
            OleFile::open(Cursor::new(vec![0u8; MINIMAL_OLEFILE_SIZE])),
            Err(OleError::NotOleFile)
        ));
    }

    #[test]
    fn test_rejects_bad_sector_shift() {
        let mut data = header();
        data[0x1E..0x20].copy_from_slice(&40u16.to_le_bytes());
        assert!(matches!(
            OleFile::open(Cursor::new(data)),
            Err(OleError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_cyclic_fat_is_corrupt() {
        // Sector 0 holds the FAT; the directory in sector 1 points to itself
        let mut data = header();
        set_fat(&mut data, &[0xFFFF_FFFD, 1]);
        assert!(matches!(
            OleFile::open(Cursor::new(data)),
            Err(OleError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_empty_directory_has_no_streams() {
        let mut data = header();
        set_fat(&mut data, &[0xFFFF_FFFD, ENDOFCHAIN]);
        // Root entry with no children
        let dir = 1024;
        let name: Vec<u8> = "Root Entry".encode_utf16().flat_map(u16::to_le_bytes).collect();
        data[dir..dir + 20].copy_from_slice(&name);
        data[dir + 64..dir + 66].copy_from_slice(&22u16.to_le_bytes());
        data[dir + 66] = STGTY_ROOT;
        data[dir + 76..dir + 80].copy_from_slice(&NOSTREAM.to_le_bytes());
        data[dir + 116..dir + 120].copy_from_slice(&ENDOFCHAIN.to_le_bytes());

        let mut ole = OleFile::open(Cursor::new(data)).unwrap();
        assert!(ole.stream_infos().is_empty());
        assert!(matches!(ole.open_stream(&["FileHeader"]), Err(OleError::StreamNotFound)));
    }
}

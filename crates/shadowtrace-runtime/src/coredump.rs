//! ELF coredump emission.
//!
//! The core already tracks each mapped segment's base/length/protection
//! for its own purposes; a coredump is just that same segment list
//! re-emitted as `PT_LOAD` program headers, plus a `PT_NOTE` carrying the
//! registers and signal info. Matches the standard Linux core format
//! closely enough that `gdb`/`addr2line` can read it. File naming follows
//! the `vgcore.<pid>[.N]` convention.

use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoredumpError {
    #[error("io error writing coredump: {0}")]
    Io(#[from] io::Error),
    #[error("no segments to dump")]
    NoSegments,
}

/// One mapped segment to include as a `PT_LOAD` entry.
#[derive(Debug, Clone)]
pub struct Segment {
    pub vaddr: u32,
    pub data: Vec<u8>,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

/// Minimal register snapshot carried in the `PT_NOTE`. Field names follow
/// the common subset of `NT_PRSTATUS`-style dumps; the real per-arch
/// register layout is an external front-end concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterNote {
    pub pc: u32,
    pub sp: u32,
    pub signal: i32,
    pub pid: i32,
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ET_CORE: u16 = 4;
const EM_386: u16 = 3;
const PT_NOTE: u32 = 4;
const PT_LOAD: u32 = 1;
const NT_PRSTATUS: u32 = 1;
const EHDR_SIZE: u16 = 52;
const PHDR_SIZE: u16 = 32;

/// Build the raw bytes of an ELF32 core file for `segments`, with `note`
/// packed into a single `PT_NOTE`. Byte layout follows ELF32's `Ehdr`/
/// `Phdr`, little-endian, matching the common Linux/x86 core convention.
pub fn build_coredump(segments: &[Segment], note: RegisterNote) -> Result<Vec<u8>, CoredumpError> {
    if segments.is_empty() {
        return Err(CoredumpError::NoSegments);
    }

    let phnum = 1 + segments.len();
    let mut out = Vec::new();

    // e_ident + Ehdr fixed fields.
    out.extend_from_slice(&ELF_MAGIC);
    out.push(1); // ELFCLASS32
    out.push(1); // ELFDATA2LSB
    out.push(1); // EV_CURRENT
    out.extend_from_slice(&[0u8; 9]); // padding
    out.extend_from_slice(&ET_CORE.to_le_bytes());
    out.extend_from_slice(&EM_386.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&0u32.to_le_bytes()); // e_entry
    out.extend_from_slice(&(EHDR_SIZE as u32).to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&EHDR_SIZE.to_le_bytes());
    out.extend_from_slice(&PHDR_SIZE.to_le_bytes());
    out.extend_from_slice(&(phnum as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    debug_assert_eq!(out.len(), EHDR_SIZE as usize);

    let note_bytes = encode_note(&note);
    let phdrs_end = EHDR_SIZE as usize + phnum * PHDR_SIZE as usize;
    let note_offset = phdrs_end;
    let mut data_offset = note_offset + note_bytes.len();

    // PT_NOTE program header.
    out.extend_from_slice(&PT_NOTE.to_le_bytes());
    out.extend_from_slice(&(note_offset as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // p_vaddr
    out.extend_from_slice(&0u32.to_le_bytes()); // p_paddr
    out.extend_from_slice(&(note_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&(note_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // p_flags
    out.extend_from_slice(&4u32.to_le_bytes()); // p_align

    // PT_LOAD program headers, one per segment.
    let mut offsets = Vec::with_capacity(segments.len());
    for seg in segments {
        offsets.push(data_offset);
        let flags = (seg.readable as u32 * 0x4) | (seg.writable as u32 * 0x2) | (seg.executable as u32 * 0x1);
        out.extend_from_slice(&PT_LOAD.to_le_bytes());
        out.extend_from_slice(&(data_offset as u32).to_le_bytes());
        out.extend_from_slice(&seg.vaddr.to_le_bytes());
        out.extend_from_slice(&seg.vaddr.to_le_bytes());
        out.extend_from_slice(&(seg.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(seg.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&4096u32.to_le_bytes());
        data_offset += seg.data.len();
    }

    debug_assert_eq!(out.len(), phdrs_end);
    out.extend_from_slice(&note_bytes);
    for seg in segments {
        out.extend_from_slice(&seg.data);
    }

    Ok(out)
}

fn encode_note(note: &RegisterNote) -> Vec<u8> {
    let name = b"CORE\0\0\0\0"; // padded to 8 bytes per ELF note alignment
    let mut desc = Vec::new();
    desc.extend_from_slice(&note.pid.to_le_bytes());
    desc.extend_from_slice(&note.signal.to_le_bytes());
    desc.extend_from_slice(&note.pc.to_le_bytes());
    desc.extend_from_slice(&note.sp.to_le_bytes());

    let mut out = Vec::new();
    out.extend_from_slice(&(name.len() as u32).to_le_bytes());
    out.extend_from_slice(&(desc.len() as u32).to_le_bytes());
    out.extend_from_slice(&NT_PRSTATUS.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&desc);
    out
}

/// Choose a `vgcore.<pid>[.N]`-style filename that doesn't already exist
/// in `dir`, mirroring the original's collision-avoidance convention.
pub fn coredump_filename(dir: &std::path::Path, pid: i32) -> std::path::PathBuf {
    let base = format!("vgcore.{pid}");
    let candidate = dir.join(&base);
    if !candidate.exists() {
        return candidate;
    }
    for n in 1u32.. {
        let candidate = dir.join(format!("{base}.{n}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// Write a coredump for `segments`/`note` to `path`.
pub fn write_coredump(path: &std::path::Path, segments: &[Segment], note: RegisterNote) -> Result<(), CoredumpError> {
    let bytes = build_coredump(segments, note)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segments_is_an_error() {
        assert!(matches!(build_coredump(&[], RegisterNote::default()), Err(CoredumpError::NoSegments)));
    }

    #[test]
    fn builds_valid_elf_header_prefix() {
        let segs = vec![Segment { vaddr: 0x1000, data: vec![0xAA; 16], readable: true, writable: false, executable: true }];
        let bytes = build_coredump(&segs, RegisterNote { pc: 0x1004, sp: 0x2000, signal: 11, pid: 42 }).unwrap();
        assert_eq!(&bytes[0..4], &ELF_MAGIC);
        assert_eq!(bytes[4], 1); // ELFCLASS32
        let e_type = u16::from_le_bytes([bytes[16], bytes[17]]);
        assert_eq!(e_type, ET_CORE);
    }

    #[test]
    fn segment_bytes_land_at_their_declared_file_offset() {
        let segs = vec![
            Segment { vaddr: 0x1000, data: vec![1, 2, 3, 4], readable: true, writable: true, executable: false },
            Segment { vaddr: 0x2000, data: vec![5, 6], readable: true, writable: false, executable: false },
        ];
        let bytes = build_coredump(&segs, RegisterNote::default()).unwrap();
        let phdrs_end = EHDR_SIZE as usize + 3 * PHDR_SIZE as usize;
        // First PT_LOAD header starts right after PT_NOTE's header.
        let load0_off_field = phdrs_end + PHDR_SIZE as usize + 4;
        let file_off = u32::from_le_bytes(bytes[load0_off_field..load0_off_field + 4].try_into().unwrap());
        assert_eq!(&bytes[file_off as usize..file_off as usize + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn coredump_filename_avoids_collisions() {
        let dir = std::env::temp_dir().join(format!("shadowtrace_coredump_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::File::create(dir.join("vgcore.7")).unwrap();
        let chosen = coredump_filename(&dir, 7);
        assert_eq!(chosen, dir.join("vgcore.7.1"));
        std::fs::remove_dir_all(&dir).ok();
    }
}

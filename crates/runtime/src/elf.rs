//! ELF program-header plumbing for embedded modules
//!
//! The interpreter binary can carry lisp source inside its own image.
//! The convention uses two program headers over the same region: a
//! standard read-only `PT_LOAD` with page-aligned sizes, and a
//! `PT_LONE` entry (a project-assigned value in the OS-specific range)
//! whose sizes hold the blob's exact byte count. The kernel maps the
//! first and ignores the second; the interpreter reads the second from
//! its own image at startup.
//!
//! `embed` and `create_placeholder` are the library halves of the
//! `lone-embed` and `create-lone-segment` tools: they patch the spare
//! `PT_NULL` headers the linker was asked to leave behind. Only 64-bit
//! images are handled, in either byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use lone_core::error::{Error, Result};

/// Program header type carrying embedded lisp data. "lone" in ASCII,
/// inside the PT_LOOS..PT_HIOS range.
pub const PT_LONE: u32 = 0x6c6f_6e65;

pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_PHDR: u32 = 6;

/// Read permission flag.
pub const PF_R: u32 = 4;

const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const CLASS_64: u8 = 2;
const DATA_LITTLE: u8 = 1;
const DATA_BIG: u8 = 2;

const HEADER_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    encoding: Encoding,
    phoff: usize,
    phentsize: usize,
    phnum: usize,
}

/// One 64-bit program header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub kind: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

fn parse_layout(elf: &[u8]) -> Result<Layout> {
    if elf.len() < HEADER_SIZE || elf[..4] != MAGIC {
        return Err(Error::Type("not an ELF image".into()));
    }
    if elf[4] != CLASS_64 {
        return Err(Error::Type("only 64-bit ELF images are supported".into()));
    }
    let encoding = match elf[5] {
        DATA_LITTLE => Encoding::Little,
        DATA_BIG => Encoding::Big,
        _ => return Err(Error::Type("unknown ELF data encoding".into())),
    };

    let (phoff, phentsize, phnum) = match encoding {
        Encoding::Little => (
            LittleEndian::read_u64(&elf[32..40]) as usize,
            LittleEndian::read_u16(&elf[54..56]) as usize,
            LittleEndian::read_u16(&elf[56..58]) as usize,
        ),
        Encoding::Big => (
            BigEndian::read_u64(&elf[32..40]) as usize,
            BigEndian::read_u16(&elf[54..56]) as usize,
            BigEndian::read_u16(&elf[56..58]) as usize,
        ),
    };

    if phentsize < PHDR_SIZE || phoff.saturating_add(phentsize * phnum) > elf.len() {
        return Err(Error::Type("program header table out of bounds".into()));
    }

    Ok(Layout {
        encoding,
        phoff,
        phentsize,
        phnum,
    })
}

fn read_header(elf: &[u8], layout: Layout, index: usize) -> ProgramHeader {
    let base = layout.phoff + index * layout.phentsize;
    let header = &elf[base..base + PHDR_SIZE];

    fn fields<E: ByteOrder>(header: &[u8]) -> ProgramHeader {
        ProgramHeader {
            kind: E::read_u32(&header[0..4]),
            flags: E::read_u32(&header[4..8]),
            offset: E::read_u64(&header[8..16]),
            vaddr: E::read_u64(&header[16..24]),
            paddr: E::read_u64(&header[24..32]),
            filesz: E::read_u64(&header[32..40]),
            memsz: E::read_u64(&header[40..48]),
            align: E::read_u64(&header[48..56]),
        }
    }

    match layout.encoding {
        Encoding::Little => fields::<LittleEndian>(header),
        Encoding::Big => fields::<BigEndian>(header),
    }
}

fn write_header(elf: &mut [u8], layout: Layout, index: usize, header: ProgramHeader) {
    let base = layout.phoff + index * layout.phentsize;
    let target = &mut elf[base..base + PHDR_SIZE];

    fn fields<E: ByteOrder>(target: &mut [u8], header: ProgramHeader) {
        E::write_u32(&mut target[0..4], header.kind);
        E::write_u32(&mut target[4..8], header.flags);
        E::write_u64(&mut target[8..16], header.offset);
        E::write_u64(&mut target[16..24], header.vaddr);
        E::write_u64(&mut target[24..32], header.paddr);
        E::write_u64(&mut target[32..40], header.filesz);
        E::write_u64(&mut target[40..48], header.memsz);
        E::write_u64(&mut target[48..56], header.align);
    }

    match layout.encoding {
        Encoding::Little => fields::<LittleEndian>(target, header),
        Encoding::Big => fields::<BigEndian>(target, header),
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Locates the `PT_LONE` entry of an image: blob file offset and exact
/// byte count.
pub fn find_lone_segment(elf: &[u8]) -> Result<Option<(u64, u64)>> {
    let layout = parse_layout(elf)?;
    for index in 0..layout.phnum {
        let header = read_header(elf, layout, index);
        if header.kind == PT_LONE && header.filesz > 0 {
            return Ok(Some((header.offset, header.filesz)));
        }
    }
    Ok(None)
}

/// Appends `blob` to an interpreter image, patching two spare `PT_NULL`
/// headers into the `PT_LOAD`/`PT_LONE` pair.
pub fn embed(elf: &mut Vec<u8>, blob: &[u8], page_size: u64) -> Result<()> {
    if blob.is_empty() {
        return Err(Error::Type("refusing to embed an empty blob".into()));
    }
    let layout = parse_layout(elf)?;

    let nulls: Vec<usize> = (0..layout.phnum)
        .filter(|&index| read_header(elf, layout, index).kind == PT_NULL)
        .collect();
    if nulls.len() < 2 {
        return Err(Error::Resolution(
            "image does not carry two spare PT_NULL program headers".into(),
        ));
    }

    // the next free page-aligned virtual address after every mapping
    let vaddr = (0..layout.phnum)
        .map(|index| read_header(elf, layout, index))
        .filter(|header| header.kind == PT_LOAD)
        .map(|header| align_up(header.vaddr + header.memsz, page_size))
        .max()
        .unwrap_or(page_size);

    let offset = align_up(elf.len() as u64, page_size);
    let aligned_size = align_up(blob.len() as u64, page_size);

    elf.resize(offset as usize, 0);
    elf.extend_from_slice(blob);
    elf.resize((offset + aligned_size) as usize, 0);

    write_header(
        elf,
        layout,
        nulls[0],
        ProgramHeader {
            kind: PT_LOAD,
            flags: PF_R,
            offset,
            vaddr,
            paddr: vaddr,
            filesz: aligned_size,
            memsz: aligned_size,
            align: page_size,
        },
    );
    write_header(
        elf,
        layout,
        nulls[1],
        ProgramHeader {
            kind: PT_LONE,
            flags: PF_R,
            offset,
            vaddr,
            paddr: vaddr,
            filesz: blob.len() as u64,
            memsz: blob.len() as u64,
            align: 1,
        },
    );

    Ok(())
}

/// Converts one spare `PT_NULL` (or, on request, the `PT_PHDR`) of a
/// freshly linked image into an empty `PT_LONE` placeholder.
pub fn create_placeholder(elf: &mut [u8], convert_phdr: bool) -> Result<()> {
    let layout = parse_layout(elf)?;
    let target = if convert_phdr { PT_PHDR } else { PT_NULL };

    for index in 0..layout.phnum {
        let header = read_header(elf, layout, index);
        if header.kind == target {
            write_header(elf, layout, index, ProgramHeader {
                kind: PT_LONE,
                ..ProgramHeader::default()
            });
            return Ok(());
        }
    }

    Err(Error::Resolution(
        "image carries no convertible program header".into(),
    ))
}

/// The embedded module blob of the running interpreter, if its image
/// carries one.
pub fn embedded_blob_from_current_executable() -> Option<Vec<u8>> {
    let path = std::env::current_exe().ok()?;
    let image = std::fs::read(path).ok()?;
    let (offset, size) = find_lone_segment(&image).ok()??;
    image
        .get(offset as usize..(offset + size) as usize)
        .map(<[u8]>::to_vec)
}

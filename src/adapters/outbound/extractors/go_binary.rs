use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use goblin::elf::program_header::{PF_W, PT_LOAD};
use goblin::mach::Mach;
use goblin::pe::section_table::{IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_MEM_WRITE};
use goblin::Object;
use std::path::Path;

const BUILD_INFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILD_INFO_ALIGN: usize = 16;
const BUILD_INFO_HEADER_SIZE: usize = 32;
/// How far past the start of the data section the header may sit.
const BUILD_INFO_SEARCH_SIZE: usize = 64 * 1024;
/// Set when pointers in a pre-1.18 header are big-endian.
const FLAG_BIG_ENDIAN: u8 = 0x1;
/// Set when the version and module strings follow the header inline (Go 1.18+).
const FLAG_VERSION_INLINE: u8 = 0x2;
const MAX_STRING_SIZE: u64 = 1 << 32;

/// File bytes loaded at a virtual address.
#[derive(Debug, Clone, Copy)]
struct Mapping {
    addr: u64,
    offset: u64,
    size: u64,
}

/// An executable seen through its virtual address space.
struct Executable<'a> {
    data: &'a [u8],
    mappings: Vec<Mapping>,
    /// Address where the build info search starts.
    data_start: u64,
}

impl<'a> Executable<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        match Object::parse(data).ok()? {
            Object::Elf(elf) => {
                let mappings = elf
                    .program_headers
                    .iter()
                    .filter(|header| header.p_type == PT_LOAD)
                    .map(|header| Mapping {
                        addr: header.p_vaddr,
                        offset: header.p_offset,
                        size: header.p_filesz,
                    })
                    .collect();
                let data_start = elf
                    .section_headers
                    .iter()
                    .find(|section| elf.shdr_strtab.get_at(section.sh_name) == Some(".go.buildinfo"))
                    .map(|section| section.sh_addr)
                    .or_else(|| {
                        elf.program_headers
                            .iter()
                            .find(|header| header.p_type == PT_LOAD && header.p_flags & PF_W != 0)
                            .map(|header| header.p_vaddr)
                    })?;
                Some(Self { data, mappings, data_start })
            }
            Object::PE(pe) => {
                let image_base = pe.image_base as u64;
                let mappings = pe
                    .sections
                    .iter()
                    .map(|section| Mapping {
                        addr: image_base + u64::from(section.virtual_address),
                        offset: u64::from(section.pointer_to_raw_data),
                        size: u64::from(section.size_of_raw_data),
                    })
                    .collect();
                let writable_data = IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_WRITE;
                let data_start = pe
                    .sections
                    .iter()
                    .find(|section| {
                        section.virtual_address != 0
                            && section.characteristics & writable_data == writable_data
                    })
                    .map(|section| image_base + u64::from(section.virtual_address))?;
                Some(Self { data, mappings, data_start })
            }
            Object::Mach(Mach::Binary(macho)) => {
                const READ_WRITE: u32 = 3;
                let mut mappings = Vec::new();
                let mut buildinfo_section = None;
                let mut writable_segment = None;
                for segment in macho.segments.iter() {
                    mappings.push(Mapping {
                        addr: segment.vmaddr,
                        offset: segment.fileoff,
                        size: segment.filesize,
                    });
                    if writable_segment.is_none()
                        && segment.vmaddr != 0
                        && segment.filesize != 0
                        && segment.initprot == READ_WRITE
                        && segment.maxprot == READ_WRITE
                    {
                        writable_segment = Some(segment.vmaddr);
                    }
                    for (section, _) in segment.sections().ok()? {
                        if section.name().ok() == Some("__go_buildinfo") {
                            buildinfo_section = Some(section.addr);
                        }
                    }
                }
                let data_start = buildinfo_section.or(writable_segment)?;
                Some(Self { data, mappings, data_start })
            }
            _ => None,
        }
    }

    /// Up to `size` bytes at `addr`, cut at the end of the mapping holding it.
    fn read(&self, addr: u64, size: usize) -> Option<&'a [u8]> {
        let mapping = self
            .mappings
            .iter()
            .find(|mapping| addr >= mapping.addr && addr - mapping.addr < mapping.size)?;
        let skip = addr - mapping.addr;
        let available = usize::try_from(mapping.size - skip).ok()?;
        let start = usize::try_from(mapping.offset.checked_add(skip)?).ok()?;
        let end = start.checked_add(size.min(available))?;
        self.data.get(start..end.min(self.data.len()))
    }

    /// Reads exactly `size` bytes at `addr`.
    fn read_exact(&self, addr: u64, size: usize) -> Option<&'a [u8]> {
        self.read(addr, size).filter(|bytes| bytes.len() == size)
    }
}

/// Build info header and its address, aligned within the data section.
fn find_header<'a>(executable: &Executable<'a>) -> Option<(&'a [u8], u64)> {
    let data = executable.read(executable.data_start, BUILD_INFO_SEARCH_SIZE)?;
    let mut offset = 0;
    while offset + BUILD_INFO_HEADER_SIZE <= data.len() {
        if data[offset..].starts_with(BUILD_INFO_MAGIC) {
            return Some((&data[offset..], executable.data_start + offset as u64));
        }
        offset += BUILD_INFO_ALIGN;
    }
    None
}

fn read_pointer(bytes: &[u8], pointer_size: usize, big_endian: bool) -> Option<u64> {
    let bytes = bytes.get(..pointer_size)?;
    match (pointer_size, big_endian) {
        (4, false) => Some(u64::from(u32::from_le_bytes(bytes.try_into().ok()?))),
        (4, true) => Some(u64::from(u32::from_be_bytes(bytes.try_into().ok()?))),
        (8, false) => Some(u64::from_le_bytes(bytes.try_into().ok()?)),
        (8, true) => Some(u64::from_be_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}

/// A Go string header `{data, len}` at `addr`, resolved to its bytes.
fn read_go_string<'a>(
    executable: &Executable<'a>,
    addr: u64,
    pointer_size: usize,
    big_endian: bool,
) -> Option<&'a [u8]> {
    let header = executable.read_exact(addr, 2 * pointer_size)?;
    let data_addr = read_pointer(header, pointer_size, big_endian)?;
    let length = read_pointer(&header[pointer_size..], pointer_size, big_endian)?;
    if length > MAX_STRING_SIZE {
        return None;
    }
    executable.read_exact(data_addr, usize::try_from(length).ok()?)
}

/// What `go version -m` would print for a binary.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub go_version: String,
    pub main_path: String,
    /// `(path, version)` of every dependency, replacements already applied.
    pub deps: Vec<(String, String)>,
}

/// Unsigned LEB128, as written by Go's `binary.PutUvarint`.
fn read_uvarint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (index, byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return Some((value, index + 1));
        }
    }
    None
}

fn read_string(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let (length, read) = read_uvarint(data)?;
    let length = usize::try_from(length).ok()?;
    let rest = data.get(read..)?;
    if rest.len() < length {
        return None;
    }
    Some(rest.split_at(length))
}

/// Strips the 16-byte sentinels Go wraps the module info in.
fn strip_sentinels(modinfo: &str) -> &str {
    let bytes = modinfo.as_bytes();
    if bytes.len() >= 33 && bytes[bytes.len() - 17] == b'\n' {
        modinfo.get(16..bytes.len() - 16).unwrap_or(modinfo)
    } else {
        modinfo
    }
}

fn parse_modinfo(modinfo: &str) -> (String, Vec<(String, String)>) {
    let mut main_path = String::new();
    let mut deps: Vec<(String, String)> = Vec::new();

    for line in strip_sentinels(modinfo).lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            ["path", path, ..] => main_path = path.to_string(),
            ["dep", path, version, ..] => deps.push((path.to_string(), version.to_string())),
            ["dep", path] => deps.push((path.to_string(), String::new())),
            ["=>", path, version, ..] => {
                if let Some(last) = deps.last_mut() {
                    *last = (path.to_string(), version.to_string());
                }
            }
            _ => {}
        }
    }

    (main_path, deps)
}

/// Locates and decodes the build info blob of a Go executable.
///
/// Handles the inline strings of Go 1.18+ and the pointer-based header of
/// older toolchains. `None` when `data` is not an executable or carries no
/// build info.
pub fn read_build_info(data: &[u8]) -> Option<BuildInfo> {
    let executable = Executable::parse(data)?;
    let (header, header_addr) = find_header(&executable)?;

    let pointer_size = usize::from(header[BUILD_INFO_MAGIC.len()]);
    let flags = header[BUILD_INFO_MAGIC.len() + 1];

    let (version, modinfo) = if flags & FLAG_VERSION_INLINE != 0 {
        let inline = executable.read(
            header_addr + BUILD_INFO_HEADER_SIZE as u64,
            BUILD_INFO_SEARCH_SIZE,
        )?;
        let (version, rest) = read_string(inline)?;
        let (modinfo, _) = read_string(rest)?;
        (version, modinfo)
    } else {
        let big_endian = flags & FLAG_BIG_ENDIAN != 0;
        let pointers = &header[16..];
        let version_addr = read_pointer(pointers, pointer_size, big_endian)?;
        let modinfo_addr = read_pointer(pointers.get(pointer_size..)?, pointer_size, big_endian)?;
        (
            read_go_string(&executable, version_addr, pointer_size, big_endian)?,
            read_go_string(&executable, modinfo_addr, pointer_size, big_endian)?,
        )
    };

    let (main_path, deps) = parse_modinfo(&String::from_utf8_lossy(modinfo));
    Some(BuildInfo {
        go_version: String::from_utf8_lossy(version).into_owned(),
        main_path,
        deps,
    })
}

/// Extractor for executables built by the Go toolchain.
#[derive(Debug, Default)]
pub struct GoBinaryExtractor;

impl GoBinaryExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for GoBinaryExtractor {
    fn should_extract(&self, path: &str) -> bool {
        if path.is_empty() || path.ends_with(std::path::MAIN_SEPARATOR) || path.ends_with('/') {
            return false;
        }
        let Some(name) = Path::new(path).file_name().and_then(|name| name.to_str()) else {
            return false;
        };

        // Dotfiles count as having an extension.
        match name.rfind('.') {
            None => true,
            Some(dot) => &name[dot..] == ".exe",
        }
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if file.bytes().is_empty() {
            return Ok(Vec::new());
        }
        let info = read_build_info(file.bytes())
            .ok_or_else(|| ExtractError::incompatible(Path::new(file.path()), "go binary"))?;

        let record = |name: &str, version: &str| {
            PackageRecord::new(name, version, Ecosystem::Go, PackageManager::Golang)
        };

        let mut records = Vec::with_capacity(info.deps.len() + 1);
        records.push(record("stdlib", info.go_version.trim_start_matches("go")));
        records.extend(
            info.deps
                .iter()
                .map(|(path, version)| record(path, version.trim_start_matches('v'))),
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;

    fn varint(mut value: usize, out: &mut Vec<u8>) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    const LOAD_ADDR: u64 = 0x400000;
    const PAYLOAD_OFFSET: usize = 128;
    /// Virtual address of the first payload byte.
    const PAYLOAD_ADDR: u64 = LOAD_ADDR + PAYLOAD_OFFSET as u64;

    /// A little-endian x86-64 ELF with one writable PT_LOAD covering the whole file.
    fn elf(payload: &[u8]) -> Vec<u8> {
        let total = (PAYLOAD_OFFSET + payload.len()) as u64;
        let mut data = Vec::new();
        data.extend_from_slice(b"\x7fELF");
        data.extend_from_slice(&[2, 1, 1, 0]);
        data.resize(16, 0);
        data.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        data.extend_from_slice(&0x3eu16.to_le_bytes()); // x86-64
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&LOAD_ADDR.to_le_bytes()); // e_entry
        data.extend_from_slice(&64u64.to_le_bytes()); // e_phoff
        data.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&64u16.to_le_bytes());
        data.extend_from_slice(&56u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&64u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        data.extend_from_slice(&PT_LOAD.to_le_bytes());
        data.extend_from_slice(&(PF_W | 0x4).to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes()); // p_offset
        data.extend_from_slice(&LOAD_ADDR.to_le_bytes()); // p_vaddr
        data.extend_from_slice(&LOAD_ADDR.to_le_bytes()); // p_paddr
        data.extend_from_slice(&total.to_le_bytes()); // p_filesz
        data.extend_from_slice(&total.to_le_bytes()); // p_memsz
        data.extend_from_slice(&0x1000u64.to_le_bytes());

        data.resize(PAYLOAD_OFFSET, 0);
        data.extend_from_slice(payload);
        data
    }

    fn header(flags: u8) -> Vec<u8> {
        let mut header = BUILD_INFO_MAGIC.to_vec();
        header.push(8);
        header.push(flags);
        header.resize(BUILD_INFO_HEADER_SIZE, 0);
        header
    }

    fn wrap(modinfo: &str) -> String {
        format!("{}{}{}", "0".repeat(16), modinfo, "1".repeat(16))
    }

    /// Go 1.18+ layout: varint-prefixed strings right after the header.
    fn binary(go_version: &str, modinfo: &str) -> Vec<u8> {
        let mut payload = header(FLAG_VERSION_INLINE);
        varint(go_version.len(), &mut payload);
        payload.extend_from_slice(go_version.as_bytes());

        let wrapped = wrap(modinfo);
        varint(wrapped.len(), &mut payload);
        payload.extend_from_slice(wrapped.as_bytes());
        elf(&payload)
    }

    /// Pre-1.18 layout: the header points at two `{data, len}` string headers.
    fn legacy_binary(go_version: &str, modinfo: &str) -> Vec<u8> {
        let wrapped = wrap(modinfo);
        let strings_addr = PAYLOAD_ADDR + 64;

        let mut payload = header(0);
        payload[16..24].copy_from_slice(&(PAYLOAD_ADDR + 32).to_le_bytes());
        payload[24..32].copy_from_slice(&(PAYLOAD_ADDR + 48).to_le_bytes());
        payload.extend_from_slice(&strings_addr.to_le_bytes());
        payload.extend_from_slice(&(go_version.len() as u64).to_le_bytes());
        payload.extend_from_slice(&(strings_addr + go_version.len() as u64).to_le_bytes());
        payload.extend_from_slice(&(wrapped.len() as u64).to_le_bytes());
        payload.extend_from_slice(go_version.as_bytes());
        payload.extend_from_slice(wrapped.as_bytes());
        elf(&payload)
    }

    const MODINFO: &str = "path\texample.com/cmd/server\n\
mod\texample.com\t(devel)\t\n\
dep\tgithub.com/pkg/errors\tv0.9.1\th1:abc=\n\
dep\tgolang.org/x/text\tv0.3.0\th1:def=\n\
=>\tgolang.org/x/text\tv0.14.0\th1:ghi=\n\
build\t-compiler=gc\n";

    #[test]
    fn test_read_build_info() {
        let info = read_build_info(&binary("go1.21.5", MODINFO)).unwrap();
        assert_eq!(info.go_version, "go1.21.5");
        assert_eq!(info.main_path, "example.com/cmd/server");
        assert_eq!(
            info.deps,
            vec![
                ("github.com/pkg/errors".to_string(), "v0.9.1".to_string()),
                ("golang.org/x/text".to_string(), "v0.14.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_read_legacy_build_info() {
        let info = read_build_info(&legacy_binary("go1.16.15", MODINFO)).unwrap();
        assert_eq!(info.go_version, "go1.16.15");
        assert_eq!(info.main_path, "example.com/cmd/server");
        assert_eq!(info.deps.len(), 2);
        assert_eq!(info.deps[1], ("golang.org/x/text".to_string(), "v0.14.0".to_string()));
    }

    #[test]
    fn test_legacy_pointer_outside_image() {
        let mut data = legacy_binary("go1.16.15", MODINFO);
        let version_header = PAYLOAD_OFFSET + 32;
        data[version_header..version_header + 8].copy_from_slice(&0x10u64.to_le_bytes());
        assert!(read_build_info(&data).is_none());
    }

    #[test]
    fn test_header_must_be_aligned() {
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(&binary("go1.21.5", MODINFO)[PAYLOAD_OFFSET..]);
        assert!(read_build_info(&elf(&payload)).is_none());
    }

    #[test]
    fn test_extract_records() {
        let file = LocalDepFile::from_content("/bin/server", binary("go1.21.5", MODINFO));
        let records = GoBinaryExtractor::new().extract(&file).unwrap();

        let keys: Vec<_> = records
            .iter()
            .map(|r| format!("{}@{}", r.name, r.version))
            .collect();
        assert_eq!(
            keys,
            vec!["stdlib@1.21.5", "github.com/pkg/errors@0.9.1", "golang.org/x/text@0.14.0"]
        );
        assert!(records.iter().all(|r| r.package_manager == PackageManager::Golang));
    }

    #[test]
    fn test_non_binary_is_incompatible() {
        let file = LocalDepFile::from_content("/repo/LICENSE", "MIT License\n");
        let err = GoBinaryExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::IncompatibleFormat { .. }));
    }

    #[test]
    fn test_executable_without_build_info_is_incompatible() {
        let file = LocalDepFile::from_content("/bin/c-tool", elf(&[0u8; 256]));
        let err = GoBinaryExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::IncompatibleFormat { .. }));
    }

    #[test]
    fn test_should_extract() {
        let extractor = GoBinaryExtractor::new();
        assert!(extractor.should_extract("/bin/server"));
        assert!(extractor.should_extract("C:/tools/app.exe"));
        assert!(!extractor.should_extract("/repo/main.go"));
        assert!(!extractor.should_extract("/home/user/.bashrc"));
        assert!(!extractor.should_extract("/bin/"));
        assert!(!extractor.should_extract(""));
    }
}

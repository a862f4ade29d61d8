//! Builds small ZIP archives for tests.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::Write;

// 1980-01-01 in MS-DOS date format
const DOS_DATE: u16 = 0x0021;
const SATURATED_U16: u16 = 0xFFFF;
const SATURATED_U32: u32 = 0xFFFFFFFF;

pub(crate) fn deflate(content: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

#[derive(Default)]
pub(crate) struct ZipBuilder {
    body: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    zip64: bool,
}

impl ZipBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Write every later entry and the end records in ZIP64 form, with the
    /// 32-bit fields saturated so readers must use the 64-bit values.
    pub(crate) fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub(crate) fn stored(self, path: &str, content: &[u8]) -> Self {
        self.raw(path, 0, content, content)
    }

    pub(crate) fn deflated(self, path: &str, content: &[u8]) -> Self {
        let compressed = deflate(content);
        self.raw(path, 8, content, &compressed)
    }

    pub(crate) fn directory(self, path: &str) -> Self {
        self.raw(path, 0, b"", b"")
    }

    /// Add an entry whose data is written as-is with the given method id.
    pub(crate) fn raw(self, path: &str, method: u16, content: &[u8], data: &[u8]) -> Self {
        self.raw_sized(path, method, content, content.len() as u64, data)
    }

    /// Like [`ZipBuilder::raw`], with the uncompressed size in the headers set to `declared_size`.
    pub(crate) fn raw_sized(
        mut self,
        path: &str,
        method: u16,
        content: &[u8],
        declared_size: u64,
        data: &[u8],
    ) -> Self {
        let mut crc = Crc::new();
        crc.update(content);
        let offset = self.body.len() as u64;
        let compressed_size = data.len() as u64;

        let (lfh_sizes, lfh_extra) = if self.zip64 {
            let mut extra = Vec::new();
            extra.write_u16::<LittleEndian>(0x0001).unwrap();
            extra.write_u16::<LittleEndian>(16).unwrap();
            extra.write_u64::<LittleEndian>(declared_size).unwrap();
            extra.write_u64::<LittleEndian>(compressed_size).unwrap();
            ((SATURATED_U32, SATURATED_U32), extra)
        } else {
            ((compressed_size as u32, declared_size as u32), Vec::new())
        };

        let lfh = &mut self.body;
        lfh.extend_from_slice(b"PK\x03\x04");
        lfh.write_u16::<LittleEndian>(if self.zip64 { 45 } else { 20 }).unwrap();
        lfh.write_u16::<LittleEndian>(0).unwrap();
        lfh.write_u16::<LittleEndian>(method).unwrap();
        lfh.write_u16::<LittleEndian>(0).unwrap();
        lfh.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        lfh.write_u32::<LittleEndian>(crc.sum()).unwrap();
        lfh.write_u32::<LittleEndian>(lfh_sizes.0).unwrap();
        lfh.write_u32::<LittleEndian>(lfh_sizes.1).unwrap();
        lfh.write_u16::<LittleEndian>(path.len() as u16).unwrap();
        lfh.write_u16::<LittleEndian>(lfh_extra.len() as u16).unwrap();
        lfh.extend_from_slice(path.as_bytes());
        lfh.extend_from_slice(&lfh_extra);
        lfh.extend_from_slice(data);

        // uncompressed size, compressed size, local header offset
        let (cd_fields, cd_extra) = if self.zip64 {
            let mut extra = Vec::new();
            extra.write_u16::<LittleEndian>(0x0001).unwrap();
            extra.write_u16::<LittleEndian>(24).unwrap();
            extra.write_u64::<LittleEndian>(declared_size).unwrap();
            extra.write_u64::<LittleEndian>(compressed_size).unwrap();
            extra.write_u64::<LittleEndian>(offset).unwrap();
            ((SATURATED_U32, SATURATED_U32, SATURATED_U32), extra)
        } else {
            (
                (declared_size as u32, compressed_size as u32, offset as u32),
                Vec::new(),
            )
        };

        let cd = &mut self.central;
        cd.extend_from_slice(b"PK\x01\x02");
        cd.write_u16::<LittleEndian>(if self.zip64 { 45 } else { 20 }).unwrap();
        cd.write_u16::<LittleEndian>(if self.zip64 { 45 } else { 20 }).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(method).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        cd.write_u32::<LittleEndian>(crc.sum()).unwrap();
        cd.write_u32::<LittleEndian>(cd_fields.1).unwrap();
        cd.write_u32::<LittleEndian>(cd_fields.0).unwrap();
        cd.write_u16::<LittleEndian>(path.len() as u16).unwrap();
        cd.write_u16::<LittleEndian>(cd_extra.len() as u16).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(cd_fields.2).unwrap();
        cd.extend_from_slice(path.as_bytes());
        cd.extend_from_slice(&cd_extra);

        self.count += 1;
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.finish_with_comment(b"")
    }

    pub(crate) fn finish_with_comment(self, comment: &[u8]) -> Vec<u8> {
        let mut out = self.body;
        let cd_offset = out.len() as u64;
        let cd_size = self.central.len() as u64;
        out.extend_from_slice(&self.central);

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            // size of the record after this field
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size).unwrap();
            out.write_u64::<LittleEndian>(cd_offset).unwrap();

            out.extend_from_slice(b"PK\x06\x07");
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (count, cd_size, cd_offset) = if self.zip64 {
            (SATURATED_U16, SATURATED_U32, SATURATED_U32)
        } else {
            (self.count, cd_size as u32, cd_offset as u32)
        };

        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(comment.len() as u16).unwrap();
        out.extend_from_slice(comment);
        out
    }
}

//! Content sniffing by magic bytes.
//!
//! A file is classified from the first [`PROBE_LEN`] bytes only. The default
//! [`SignatureTable`] is the image and video subset of the `infer` matchers;
//! callers can pass any other [`Matcher`] to the hash pool to widen or narrow
//! that set.

use crate::data::MediaKind;
use infer::{image, video};

/// Size of the probe window. Every supported signature fits inside it.
pub const PROBE_LEN: usize = 261;

/// Classifies a probe window.
///
/// Implemented for [`SignatureTable`] and for plain closures, so a custom
/// matcher can be as small as `|buf: &[u8]| buf.starts_with(b"GIF8").then_some(kind)`.
pub trait Matcher: Send + Sync {
    fn sniff(&self, probe: &[u8]) -> Option<MediaKind>;
}

impl<F> Matcher for F
where
    F: Fn(&[u8]) -> Option<MediaKind> + Send + Sync,
{
    fn sniff(&self, probe: &[u8]) -> Option<MediaKind> {
        self(probe)
    }
}

/// A single magic-byte rule.
#[derive(Clone, Copy)]
pub struct Signature {
    pub kind: MediaKind,
    pub matches: fn(&[u8]) -> bool,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature").field("kind", &self.kind).finish()
    }
}

/// Ordered list of signatures; the first match wins.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl SignatureTable {
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// Image signatures only
    pub fn images() -> Self {
        Self::new(IMAGE_SIGNATURES.to_vec())
    }

    /// Video signatures only
    pub fn videos() -> Self {
        Self::new(VIDEO_SIGNATURES.to_vec())
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Default for SignatureTable {
    /// Images followed by videos
    fn default() -> Self {
        let mut signatures = IMAGE_SIGNATURES.to_vec();
        signatures.extend_from_slice(VIDEO_SIGNATURES);
        Self::new(signatures)
    }
}

impl Matcher for SignatureTable {
    fn sniff(&self, probe: &[u8]) -> Option<MediaKind> {
        if probe.len() < PROBE_LEN {
            return None;
        }
        self.signatures
            .iter()
            .find(|sig| (sig.matches)(probe))
            .map(|sig| sig.kind)
    }
}

static IMAGE_SIGNATURES: &[Signature] = &[
    Signature { kind: MediaKind::image("jpg", "image/jpeg"), matches: image::is_jpeg },
    Signature { kind: MediaKind::image("jp2", "image/jp2"), matches: image::is_jpeg2000 },
    Signature { kind: MediaKind::image("png", "image/png"), matches: image::is_png },
    Signature { kind: MediaKind::image("gif", "image/gif"), matches: image::is_gif },
    Signature { kind: MediaKind::image("webp", "image/webp"), matches: image::is_webp },
    Signature { kind: MediaKind::image("cr2", "image/x-canon-cr2"), matches: image::is_cr2 },
    Signature { kind: MediaKind::image("tif", "image/tiff"), matches: is_tiff },
    Signature { kind: MediaKind::image("bmp", "image/bmp"), matches: image::is_bmp },
    Signature { kind: MediaKind::image("jxr", "image/vnd.ms-photo"), matches: image::is_jxr },
    Signature { kind: MediaKind::image("psd", "image/vnd.adobe.photoshop"), matches: image::is_psd },
    Signature { kind: MediaKind::image("ico", "image/vnd.microsoft.icon"), matches: image::is_ico },
    Signature { kind: MediaKind::image("heif", "image/heif"), matches: image::is_heif },
    Signature { kind: MediaKind::image("avif", "image/avif"), matches: image::is_avif },
];

static VIDEO_SIGNATURES: &[Signature] = &[
    Signature { kind: MediaKind::video("m4v", "video/x-m4v"), matches: video::is_m4v },
    Signature { kind: MediaKind::video("mp4", "video/mp4"), matches: video::is_mp4 },
    Signature { kind: MediaKind::video("mov", "video/quicktime"), matches: video::is_mov },
    Signature { kind: MediaKind::video("3gp", "video/3gpp"), matches: is_3gp },
    Signature { kind: MediaKind::video("webm", "video/webm"), matches: video::is_webm },
    Signature { kind: MediaKind::video("mkv", "video/x-matroska"), matches: video::is_mkv },
    Signature { kind: MediaKind::video("avi", "video/x-msvideo"), matches: video::is_avi },
    Signature { kind: MediaKind::video("wmv", "video/x-ms-wmv"), matches: video::is_wmv },
    Signature { kind: MediaKind::video("mpg", "video/mpeg"), matches: video::is_mpeg },
    Signature { kind: MediaKind::video("flv", "video/x-flv"), matches: video::is_flv },
];

/// TIFF that is not a Canon raw file.
fn is_tiff(buf: &[u8]) -> bool {
    image::is_tiff(buf) && !image::is_cr2(buf)
}

/// 3GPP container: `ftyp` box whose major brand starts with `3gp`.
fn is_3gp(buf: &[u8]) -> bool {
    buf.len() >= 11 && &buf[4..8] == b"ftyp" && &buf[8..11] == b"3gp"
}

//! Output encoding and naming.
//!
//! The sheet is encoded as JPEG or PNG depending on the output suffix.
//! [`OutputPaths`] derives every file a run may write from the input path, so
//! callers can check for collisions before decoding anything.

use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat, RgbaImage, codecs::jpeg::JpegEncoder};

use crate::{configuration::LayoutSpec, error::SheetError, overlay};

/// Image container for a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossy, no alpha channel.
    Jpeg,
    /// Lossless, keeps transparency.
    Png,
}

impl OutputFormat {
    /// PNG for a `.png` extension (case-insensitive), JPEG for anything else.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
        {
            Some(extension) if extension.eq_ignore_ascii_case("png") => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }
}

/// Encode `image` in `format`. JPEG output flattens the alpha channel away.
///
/// # Errors
///
/// Returns [`SheetError::EncodeFailed`] if the encoder rejects the image.
pub fn encode(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, SheetError> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
                .encode_image(&rgb)
                .map_err(|error| SheetError::EncodeFailed(error.to_string()))?;
        }
        OutputFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .map_err(|error| SheetError::EncodeFailed(error.to_string()))?;
        }
    }
    Ok(buffer)
}

/// Which variant of a per-shot image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotKind {
    /// The tile as it appears in the sheet.
    Thumbnail,
    /// The accepted frame at its decoded, upright size.
    Original,
}

/// Every path a run may write, derived from the input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// The sheet itself: `<dir>/<stem><suffix>`.
    pub sheet: PathBuf,
    /// Info sidecar: `<dir>/<stem><info_suffix>`, if requested.
    pub info: Option<PathBuf>,
    directory: PathBuf,
    stem: String,
    shot_extension: String,
}

impl OutputPaths {
    /// Derive output paths for `input`.
    ///
    /// The directory is `spec.output_dir` or the input's parent. The base
    /// name is `spec.output_name`, else the input's file name when
    /// `spec.full_filename` is set, else its stem.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidLayout`] if the input has no file stem.
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::Path;
    /// use thumbsheet::{LayoutSpec, OutputPaths};
    ///
    /// let paths = OutputPaths::derive("videos/trip.mp4", &LayoutSpec::default()).unwrap();
    /// assert_eq!(paths.sheet, Path::new("videos/trip_s.jpg"));
    /// ```
    pub fn derive<P: AsRef<Path>>(input: P, spec: &LayoutSpec) -> Result<Self, SheetError> {
        let input = input.as_ref();
        let base = match &spec.output_name {
            Some(name) => Some(name.clone()),
            None if spec.full_filename => input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            None => input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
        };
        let stem = base
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                SheetError::InvalidLayout(format!(
                    "cannot derive output name from '{}'",
                    input.display()
                ))
            })?;

        let directory = match &spec.output_dir {
            Some(directory) => directory.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let sheet = directory.join(format!("{stem}{}", spec.output_suffix));
        let shot_extension = sheet
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_else(|| ".jpg".to_string());
        let info = spec
            .info_suffix
            .as_ref()
            .map(|suffix| directory.join(format!("{stem}{suffix}")));

        Ok(Self {
            sheet,
            info,
            directory,
            stem,
            shot_extension,
        })
    }

    /// Path of a per-shot image for target `index`.
    ///
    /// Thumbnails are `<stem>_<NNN><ext>`, originals `<stem>_<NNN>_full<ext>`.
    pub fn shot(&self, index: usize, kind: ShotKind) -> PathBuf {
        let marker = match kind {
            ShotKind::Thumbnail => "",
            ShotKind::Original => "_full",
        };
        self.directory.join(format!(
            "{}_{index:03}{marker}{}",
            self.stem, self.shot_extension
        ))
    }

    /// Fail early if the sheet or info sidecar exists and overwriting is
    /// disabled.
    ///
    /// Per-shot paths depend on which targets are accepted, so they are
    /// checked by [`PendingOutputs::commit`] before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::OutputExists`] for the first existing path.
    pub fn check_overwrite(&self, spec: &LayoutSpec) -> Result<(), SheetError> {
        if spec.overwrite {
            return Ok(());
        }
        for path in std::iter::once(&self.sheet).chain(self.info.as_ref()) {
            if path.exists() {
                return Err(SheetError::OutputExists(path.clone()));
            }
        }
        Ok(())
    }

    /// Directory every output is written into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Text of the info sidecar: the info block, then `<index>\t<HH:MM:SS.mmm>`
/// per placed shot.
pub fn info_sidecar(info_lines: &[String], shots: &[(usize, f64)]) -> String {
    let mut text = String::new();
    for line in info_lines {
        text.push_str(line);
        text.push('\n');
    }
    for (index, timestamp) in shots {
        text.push_str(&format!(
            "{index}\t{}\n",
            overlay::format_precise_timestamp(*timestamp)
        ));
    }
    text
}

/// Every file of one run, encoded in memory and written all at once.
///
/// [`commit`](PendingOutputs::commit) checks every destination first, writes
/// each file to a hidden staging name next to it, then renames the staged
/// files into place. Any failure removes whatever the commit already
/// produced, so a run either writes all of its outputs or none of them.
#[derive(Debug, Default)]
pub struct PendingOutputs {
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl PendingOutputs {
    /// Create an empty set of outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `image` for `path`, choosing the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::EncodeFailed`] if the encoder rejects the image.
    pub fn push_image(&mut self, path: PathBuf, image: &RgbaImage, quality: u8) -> Result<(), SheetError> {
        let bytes = encode(image, OutputFormat::from_path(&path), quality)?;
        self.files.push((path, bytes));
        Ok(())
    }

    /// Queue raw bytes for `path`.
    pub fn push_bytes(&mut self, path: PathBuf, bytes: Vec<u8>) {
        self.files.push((path, bytes));
    }

    /// Destinations in the order they were queued.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(path, _)| path.as_path())
    }

    /// Number of queued files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every queued file, or none of them.
    ///
    /// # Errors
    ///
    /// - [`SheetError::OutputExists`] if a destination exists and `overwrite`
    ///   is `false`.
    /// - [`SheetError::OutputCreate`] if a destination is a directory or a
    ///   file cannot be written or moved into place.
    pub fn commit(self, overwrite: bool) -> Result<Vec<PathBuf>, SheetError> {
        for (path, _) in &self.files {
            if path.is_dir() {
                return Err(output_create(path, "destination is a directory"));
            }
            if !overwrite && path.exists() {
                return Err(SheetError::OutputExists(path.clone()));
            }
        }

        let mut staged: Vec<(PathBuf, &PathBuf)> = Vec::with_capacity(self.files.len());
        for (path, bytes) in &self.files {
            let staging = staging_path(path);
            if let Err(error) = write_bytes(&staging, bytes) {
                discard(staged.iter().map(|(staging, _)| staging.as_path()));
                discard(std::iter::once(staging.as_path()));
                return Err(output_create(path, &error.to_string()));
            }
            staged.push((staging, path));
        }

        let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for (position, (staging, path)) in staged.iter().enumerate() {
            if let Err(error) = fs::rename(staging, path) {
                discard(staged[position..].iter().map(|(staging, _)| staging.as_path()));
                discard(committed.iter().map(PathBuf::as_path));
                return Err(output_create(path, &error.to_string()));
            }
            log::debug!("Wrote {}", path.display());
            committed.push((*path).clone());
        }

        Ok(committed)
    }
}

/// Hidden sibling of `path` used while a commit is in flight.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

fn output_create(path: &Path, reason: &str) -> SheetError {
    SheetError::OutputCreate {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => log::warn!("Failed to remove {}: {error}", path.display()),
        }
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), SheetError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

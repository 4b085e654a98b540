// src/services/images.rs

//! Image downloads and size-bounded derivatives.
//!
//! ## Output Layout
//!
//! ```text
//! output/
//! ├── images/                 # Originals, named by block id
//! │   └── {id}.{ext}
//! └── thumbnails/             # One directory per configured size
//!     ├── small/{id}.avif
//!     ├── medium/{id}.avif
//!     └── large/{id}.avif
//! ```
//!
//! Files are keyed by the image block id, never by URL, because hosted image
//! URLs are signed and change on every fetch.

use std::fs;
use std::path::{Component, Path, PathBuf};

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use maud::html;

use crate::error::{AppError, Result};
use crate::models::{DerivativeFormat, DerivativeSet, DerivativeSize, ImageConfig, ImageSource};
use crate::services::segment::ImageTagger;
use crate::storage::local::write_atomic;
use crate::utils::http::Fetch;
use crate::utils::url_extension;

/// Directory for downloaded originals, relative to the output directory.
pub const IMAGES_DIR: &str = "images";

/// Directory for derivatives, relative to the output directory.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Extension used when the URL path has none.
const FALLBACK_EXTENSION: &str = "jpg";

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Largest size that fits within `max × max` with the same aspect ratio.
///
/// Images already inside the box keep their size. A zero bound counts as 1.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let max = max.max(1);
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let fit = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, max);
    (fit(width), fit(height))
}

/// Web path (`/a/b.ext`) for a path relative to the output directory.
pub fn web_path(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("/{}", parts.join("/"))
}

/// Downloads originals and maintains their derivatives.
pub struct ImageStore<F: Fetch> {
    fetcher: F,
    output_dir: PathBuf,
    config: ImageConfig,
}

impl<F: Fetch> ImageStore<F> {
    pub fn new(fetcher: F, output_dir: impl Into<PathBuf>, config: &ImageConfig) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
            config: config.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(IMAGES_DIR)
    }

    /// Derivative location relative to the output directory.
    pub fn derivative_path(&self, label: &str, image_id: &str) -> PathBuf {
        Path::new(THUMBNAILS_DIR)
            .join(label)
            .join(format!("{}.{}", image_id, self.config.format.extension()))
    }

    /// Download an image unless it is already on disk.
    ///
    /// Returns the path relative to the output directory.
    pub fn download(&self, image_id: &str, url: &str) -> Result<PathBuf> {
        let ext = url_extension(url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let relative = Path::new(IMAGES_DIR).join(format!("{image_id}.{ext}"));
        let dest = self.output_dir.join(&relative);

        if dest.exists() {
            log::debug!("Image {} already downloaded", image_id);
            return Ok(relative);
        }

        let bytes = self.fetcher.get_bytes(url)?;
        write_atomic(&dest, &bytes)?;
        log::info!("Saved image {:?} ({} bytes)", dest, bytes.len());
        Ok(relative)
    }

    /// Make sure every configured derivative of `source` exists.
    ///
    /// Existing files are reported as-is. Sizes that fail to encode are
    /// logged and left out of the result.
    pub fn ensure_derivatives(&self, image_id: &str, source: &Path) -> DerivativeSet {
        self.generate(image_id, source, false)
    }

    /// Re-encode every derivative of every downloaded original.
    ///
    /// Returns the number of originals that produced at least one derivative.
    pub fn regenerate_all(&self) -> Result<usize> {
        let dir = self.images_dir();
        if !dir.exists() {
            log::warn!("Image directory {:?} does not exist", dir);
            return Ok(0);
        }

        let mut sources: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        sources.sort();

        let mut processed = 0;
        for source in sources {
            let Some(image_id) = source.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let set = self.generate(image_id, &source, true);
            if set.sizes.is_empty() {
                log::warn!("No derivatives produced for {:?}", source);
            } else {
                log::info!("Regenerated {} derivatives for {}", set.sizes.len(), image_id);
                processed += 1;
            }
        }

        log::info!("Regenerated derivatives for {} images", processed);
        Ok(processed)
    }

    fn generate(&self, image_id: &str, source: &Path, force: bool) -> DerivativeSet {
        let mut set = DerivativeSet {
            image_id: image_id.to_string(),
            ..Default::default()
        };
        // Decoded on first use so that a fully cached set never touches the source
        let mut decoded: Option<DynamicImage> = None;

        for size in &self.config.sizes {
            let relative = self.derivative_path(&size.label, image_id);
            let dest = self.output_dir.join(&relative);

            if !force && dest.exists() {
                set.sizes.insert(size.label.clone(), relative);
                continue;
            }

            if decoded.is_none() {
                match decode(image_id, source) {
                    Ok(img) => decoded = Some(img),
                    Err(e) => {
                        log::warn!("{}", e);
                        break;
                    }
                }
            }
            let Some(img) = decoded.as_ref() else {
                break;
            };

            match self.encode(image_id, img, size, &dest) {
                Ok(()) => {
                    log::debug!("Wrote derivative {:?}", dest);
                    set.sizes.insert(size.label.clone(), relative);
                }
                Err(e) => log::warn!("{}", e),
            }
        }
        set
    }

    fn encode(&self, image_id: &str, img: &DynamicImage, size: &DerivativeSize, dest: &Path) -> Result<()> {
        let (width, height) = fit_within(img.width(), img.height(), size.width);
        let resized = if (width, height) == (img.width(), img.height()) {
            img.clone()
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };

        let context = format!("{image_id} ({})", size.label);
        let mut buf = Vec::new();
        match self.config.format {
            DerivativeFormat::Avif => {
                let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, self.config.quality);
                resized
                    .write_with_encoder(encoder)
                    .map_err(|e| AppError::image(&context, e))?;
            }
            DerivativeFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.config.quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| AppError::image(&context, e))?;
            }
        }

        write_atomic(dest, &buf)
    }
}

fn decode(image_id: &str, source: &Path) -> Result<DynamicImage> {
    ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| AppError::image(image_id, format!("decode {}: {}", source.display(), e)))
}

/// [`ImageTagger`] that downloads images and links their derivatives.
pub struct DefaultImageTagger<F: Fetch> {
    store: ImageStore<F>,
}

impl<F: Fetch> DefaultImageTagger<F> {
    pub fn new(store: ImageStore<F>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ImageStore<F> {
        &self.store
    }
}

impl<F: Fetch> ImageTagger for DefaultImageTagger<F> {
    fn image_tag(&mut self, image_id: &str, source: &ImageSource) -> String {
        let remote = source.url();
        match self.store.download(image_id, remote) {
            Ok(relative) => {
                let set = self
                    .store
                    .ensure_derivatives(image_id, &self.store.output_dir().join(&relative));
                image_tag(&web_path(&relative), &set, &self.store.config.sizes)
            }
            Err(e) => {
                log::warn!("Image {} download failed, linking remote: {}", image_id, e);
                image_tag(remote, &DerivativeSet::default(), &[])
            }
        }
    }
}

/// Clickable image tag. Derivatives, when present, go into `srcset`.
pub fn image_tag(src: &str, set: &DerivativeSet, sizes: &[DerivativeSize]) -> String {
    let srcset: Vec<String> = sizes
        .iter()
        .filter_map(|size| {
            set.sizes
                .get(&size.label)
                .map(|path| format!("{} {}w", web_path(path), size.width))
        })
        .collect();
    let srcset = (!srcset.is_empty()).then(|| srcset.join(", "));

    html! {
        a href=(src) target="_blank" {
            img.embedimg src=(src) srcset=[srcset] alt="" loading="lazy";
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    struct StubFetch {
        body: Option<Vec<u8>>,
        calls: Cell<usize>,
    }

    impl StubFetch {
        fn serving(body: Vec<u8>) -> Self {
            Self {
                body: Some(body),
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                calls: Cell::new(0),
            }
        }
    }

    impl Fetch for StubFetch {
        fn get_text(&self, url: &str) -> Result<String> {
            Err(AppError::Status {
                url: url.to_string(),
                status: 404,
            })
        }

        fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.body.clone().ok_or_else(|| AppError::Status {
                url: url.to_string(),
                status: 500,
            })
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn jpeg_config() -> ImageConfig {
        ImageConfig {
            format: DerivativeFormat::Jpeg,
            ..Default::default()
        }
    }

    #[test]
    fn fit_within_keeps_aspect_ratio() {
        assert_eq!(fit_within(1000, 500, 380), (380, 190));
        assert_eq!(fit_within(500, 1000, 380), (190, 380));
        assert_eq!(fit_within(720, 720, 720), (720, 720));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(200, 100, 720), (200, 100));
    }

    #[test]
    fn fit_within_extreme_aspect() {
        assert_eq!(fit_within(10_000, 10, 380), (380, 1));
    }

    #[test]
    fn fit_within_zero_bound() {
        assert_eq!(fit_within(640, 480, 0), (1, 1));
    }

    #[test]
    fn default_format_writes_avif() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(
            StubFetch::serving(png_bytes(800, 400)),
            tmp.path(),
            &ImageConfig::default(),
        );

        let relative = store.download("photo", "https://img.example/photo.png").unwrap();
        let set = store.ensure_derivatives("photo", &tmp.path().join(relative));

        assert_eq!(set.sizes.len(), 3);
        assert_eq!(
            set.sizes["small"],
            Path::new("thumbnails").join("small").join("photo.avif")
        );
        for path in set.sizes.values() {
            assert!(fs::metadata(tmp.path().join(path)).unwrap().len() > 0);
        }
    }

    #[test]
    fn web_path_uses_forward_slashes() {
        assert_eq!(
            web_path(&Path::new("thumbnails").join("small").join("a.avif")),
            "/thumbnails/small/a.avif"
        );
    }

    #[test]
    fn download_skips_existing_file() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::serving(png_bytes(4, 4)), tmp.path(), &jpeg_config());

        let url = "https://s3.example/x/photo.PNG?X-Amz-Signature=abc";
        let first = store.download("img-1", url).unwrap();
        assert_eq!(first, Path::new("images").join("img-1.png"));
        assert!(tmp.path().join(&first).exists());

        let second = store.download("img-1", url).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.fetcher.calls.get(), 1);
    }

    #[test]
    fn download_failure_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::failing(), tmp.path(), &jpeg_config());
        assert!(store.download("img-1", "https://img.example/a.png").is_err());
        assert!(!tmp.path().join("images/img-1.png").exists());
    }

    #[test]
    fn derivatives_are_bounded() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::serving(png_bytes(1000, 500)), tmp.path(), &jpeg_config());

        let relative = store.download("wide", "https://img.example/wide.png").unwrap();
        let set = store.ensure_derivatives("wide", &tmp.path().join(relative));
        assert_eq!(set.sizes.len(), 3);

        let small = tmp.path().join(&set.sizes["small"]);
        assert_eq!(image::image_dimensions(&small).unwrap(), (380, 190));
        let large = tmp.path().join(&set.sizes["large"]);
        assert_eq!(image::image_dimensions(&large).unwrap(), (720, 360));
    }

    #[test]
    fn existing_derivative_is_not_reencoded() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::failing(), tmp.path(), &jpeg_config());

        for size in &store.config.sizes {
            let path = tmp.path().join(store.derivative_path(&size.label, "cached"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"sentinel").unwrap();
        }

        // The source does not exist, so any decode attempt would fail
        let set = store.ensure_derivatives("cached", &tmp.path().join("images/missing.png"));
        assert_eq!(set.sizes.len(), 3);
        assert_eq!(
            set.sizes["medium"],
            Path::new("thumbnails").join("medium").join("cached.jpg")
        );
        let bytes = fs::read(tmp.path().join(&set.sizes["medium"])).unwrap();
        assert_eq!(bytes, b"sentinel");
    }

    #[test]
    fn undecodable_source_yields_empty_set() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::failing(), tmp.path(), &jpeg_config());
        let source = tmp.path().join("broken.png");
        fs::write(&source, b"not an image").unwrap();

        assert!(store.ensure_derivatives("broken", &source).sizes.is_empty());
    }

    #[test]
    fn regenerate_all_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::failing(), tmp.path(), &jpeg_config());
        assert_eq!(store.regenerate_all().unwrap(), 0);

        let images = tmp.path().join(IMAGES_DIR);
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("a.png"), png_bytes(800, 600)).unwrap();
        fs::write(images.join("b.png"), b"garbage").unwrap();

        let stale = tmp.path().join(store.derivative_path("small", "a"));
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"stale").unwrap();

        assert_eq!(store.regenerate_all().unwrap(), 1);
        assert_ne!(fs::read(&stale).unwrap(), b"stale");
    }

    #[test]
    fn tagger_links_local_copy() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::serving(png_bytes(600, 400)), tmp.path(), &jpeg_config());
        let mut tagger = DefaultImageTagger::new(store);

        let tag = tagger.image_tag("p1", &ImageSource::Hosted("https://s3.example/p.png?sig=1".into()));
        assert!(tag.starts_with(r#"<a href="/images/p1.png" target="_blank"><img class="embedimg" src="/images/p1.png""#));
        assert!(tag.contains("/thumbnails/small/p1.jpg 380w"));
        assert!(tag.contains(r#"alt="" loading="lazy">"#));
    }

    #[test]
    fn tagger_falls_back_to_remote_url() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(StubFetch::failing(), tmp.path(), &jpeg_config());
        let mut tagger = DefaultImageTagger::new(store);

        let tag = tagger.image_tag("p2", &ImageSource::External("https://img.example/p.png".into()));
        assert_eq!(
            tag,
            r#"<a href="https://img.example/p.png" target="_blank"><img class="embedimg" src="https://img.example/p.png" alt="" loading="lazy"></a>"#
        );
    }
}

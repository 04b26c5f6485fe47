//! Frame sources for the luminance mapper. Decoding happens off the render
//! loop; the mapper only ever polls.

use crate::error::VideoError;
use image::{codecs::gif::GifDecoder, AnimationDecoder, ImageFormat, Rgba, RgbaImage};
use log::{debug, info, warn};
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::Duration,
};

/// Frame period for image directories.
const STILLS_FRAME: Duration = Duration::from_micros(33_333);
/// GIF delays below this are treated as unset.
const MIN_GIF_DELAY: Duration = Duration::from_millis(20);
const DEFAULT_GIF_DELAY: Duration = Duration::from_millis(100);
const STILL_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "webp", "gif"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

pub(crate) trait VideoSource {
    /// Non-blocking readiness check.
    fn poll(&mut self) -> Readiness;

    /// Length of one loop; zero for a still.
    fn duration(&self) -> Duration;

    /// Frame shown at `t` into the loop, if one is decoded.
    fn frame_at(&mut self, t: Duration) -> Option<&RgbaImage>;

    fn describe(&self) -> String;
}

/// Decoded frames with their start offsets.
pub(crate) struct Clip {
    starts: Vec<Duration>,
    frames: Vec<RgbaImage>,
    total: Duration,
}

impl Clip {
    pub(crate) fn new(frames: Vec<(RgbaImage, Duration)>) -> Self {
        let mut starts = Vec::with_capacity(frames.len());
        let mut images = Vec::with_capacity(frames.len());
        let mut total = Duration::ZERO;
        for (img, delay) in frames {
            starts.push(total);
            images.push(img);
            total += delay;
        }
        Self {
            starts,
            frames: images,
            total,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn duration(&self) -> Duration {
        self.total
    }

    pub(crate) fn frame_at(&self, t: Duration) -> Option<&RgbaImage> {
        let i = self.starts.partition_point(|&s| s <= t).saturating_sub(1);
        self.frames.get(i)
    }
}

/// Decodes `path` in full. `cancel` is checked between frames; once it is
/// set the partial clip is dropped and `VideoError::Cancelled` returned.
pub(crate) fn decode_clip(path: &Path, cancel: &AtomicBool) -> Result<Clip, VideoError> {
    let io = |source| VideoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let cancelled = || VideoError::Cancelled(path.to_path_buf());
    let meta = fs::metadata(path).map_err(io)?;
    let frames: Vec<(RgbaImage, Duration)> = if meta.is_dir() {
        decode_stills(path, cancel)?
    } else if has_extension(path, "gif") {
        let reader = BufReader::new(File::open(path).map_err(io)?);
        let mut frames = Vec::new();
        for frame in GifDecoder::new(reader)?.into_frames() {
            if cancel.load(Ordering::Relaxed) {
                return Err(cancelled());
            }
            let frame = frame?;
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = Duration::from_millis((numer / denom.max(1)) as u64);
            let delay = if delay < MIN_GIF_DELAY { DEFAULT_GIF_DELAY } else { delay };
            frames.push((frame.into_buffer(), delay));
        }
        frames
    } else {
        ImageFormat::from_path(path).map_err(|_| VideoError::Unsupported(path.to_path_buf()))?;
        vec![(image::open(path)?.to_rgba8(), Duration::ZERO)]
    };
    if cancel.load(Ordering::Relaxed) {
        return Err(cancelled());
    }
    if frames.is_empty() {
        return Err(VideoError::Empty(path.to_path_buf()));
    }
    Ok(Clip::new(frames))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn decode_stills(dir: &Path, cancel: &AtomicBool) -> Result<Vec<(RgbaImage, Duration)>, VideoError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| VideoError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| STILL_EXTENSIONS.iter().any(|ext| has_extension(p, ext)))
        .collect();
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for p in paths {
        if cancel.load(Ordering::Relaxed) {
            return Err(VideoError::Cancelled(dir.to_path_buf()));
        }
        match image::open(&p) {
            Ok(img) => frames.push((img.to_rgba8(), STILLS_FRAME)),
            Err(e) => warn!("skipping {}: {e}", p.display()),
        }
    }
    Ok(frames)
}

enum Slot {
    Pending(Receiver<Result<Clip, VideoError>>),
    Ready(Clip),
    Failed(String),
}

/// A clip decoded on a background thread.
pub(crate) struct DecodedSource {
    path: PathBuf,
    slot: Slot,
    cancel: Arc<AtomicBool>,
}

impl DecodedSource {
    pub(crate) fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let job = path.clone();
        let stop = Arc::clone(&cancel);
        let spawned = thread::Builder::new()
            .name("video-decode".to_string())
            .spawn(move || match decode_clip(&job, &stop) {
                Err(VideoError::Cancelled(p)) => debug!("decode of {} cancelled", p.display()),
                // The receiver is gone if the kernel was unmounted first.
                clip => {
                    let _ = tx.send(clip);
                }
            });
        let slot = match spawned {
            Ok(_) => Slot::Pending(rx),
            Err(e) => Slot::Failed(format!("could not start decoder: {e}")),
        };
        Self { path, slot, cancel }
    }
}

impl Drop for DecodedSource {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl VideoSource for DecodedSource {
    fn poll(&mut self) -> Readiness {
        if let Slot::Pending(rx) = &self.slot {
            match rx.try_recv() {
                Ok(Ok(clip)) => {
                    info!(
                        "decoded {}: {} frames, {:.2}s",
                        self.path.display(),
                        clip.len(),
                        clip.duration().as_secs_f32()
                    );
                    self.slot = Slot::Ready(clip);
                }
                Ok(Err(e)) => {
                    warn!("video source failed: {e}");
                    self.slot = Slot::Failed(e.to_string());
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.slot = Slot::Failed("decoder exited".to_string());
                }
            }
        }
        match &self.slot {
            Slot::Pending(_) => Readiness::Pending,
            Slot::Ready(_) => Readiness::Ready,
            Slot::Failed(msg) => Readiness::Failed(msg.clone()),
        }
    }

    fn duration(&self) -> Duration {
        match &self.slot {
            Slot::Ready(clip) => clip.duration(),
            _ => Duration::ZERO,
        }
    }

    fn frame_at(&mut self, t: Duration) -> Option<&RgbaImage> {
        match &self.slot {
            Slot::Ready(clip) => clip.frame_at(t),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Built-in moving test pattern, rendered on demand.
pub(crate) struct PatternSource {
    image: RgbaImage,
    rendered: Option<Duration>,
}

impl PatternSource {
    pub(crate) const WIDTH: u32 = 192;
    pub(crate) const HEIGHT: u32 = 108;
    pub(crate) const PERIOD: Duration = Duration::from_secs(8);

    pub(crate) fn new() -> Self {
        Self {
            image: RgbaImage::new(Self::WIDTH, Self::HEIGHT),
            rendered: None,
        }
    }

    fn render(&mut self, t: Duration) {
        let phase = t.as_secs_f32() / Self::PERIOD.as_secs_f32() * std::f32::consts::TAU;
        let (w, h) = (Self::WIDTH as f32, Self::HEIGHT as f32);
        for (x, y, px) in self.image.enumerate_pixels_mut() {
            let (u, v) = (x as f32 / w, y as f32 / h);
            let (cx, cy) = (u - 0.5 - 0.2 * phase.cos(), (v - 0.5) * 0.6 - 0.15 * phase.sin());
            let ring = ((cx * cx + cy * cy).sqrt() * 18.0 - phase * 2.0).sin();
            let wave = (u * 9.0 + phase).sin() + (v * 7.0 - phase).cos();
            let value = ((ring + 0.5 * wave) / 2.0 * 0.5 + 0.5).clamp(0.0, 1.0);
            let hue = u + phase / std::f32::consts::TAU;
            let tint = |offset: f32| {
                let c = ((hue + offset) * std::f32::consts::TAU).cos() * 0.25 + 0.75;
                (value * c * 255.0) as u8
            };
            *px = Rgba([tint(0.0), tint(1.0 / 3.0), tint(2.0 / 3.0), 255]);
        }
        self.rendered = Some(t);
    }
}

impl VideoSource for PatternSource {
    fn poll(&mut self) -> Readiness {
        Readiness::Ready
    }

    fn duration(&self) -> Duration {
        Self::PERIOD
    }

    fn frame_at(&mut self, t: Duration) -> Option<&RgbaImage> {
        if self.rendered != Some(t) {
            self.render(t);
        }
        Some(&self.image)
    }

    fn describe(&self) -> String {
        "test pattern".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([v, v, v, 255]))
    }

    #[test]
    fn clip_lookup_uses_frame_starts() {
        let clip = Clip::new(vec![
            (solid(10), Duration::from_millis(100)),
            (solid(20), Duration::from_millis(50)),
            (solid(30), Duration::from_millis(100)),
        ]);
        assert_eq!(clip.duration(), Duration::from_millis(250));
        let at = |ms| clip.frame_at(Duration::from_millis(ms)).unwrap().get_pixel(0, 0).0[0];
        assert_eq!(at(0), 10);
        assert_eq!(at(99), 10);
        assert_eq!(at(100), 20);
        assert_eq!(at(149), 20);
        assert_eq!(at(150), 30);
        assert_eq!(at(10_000), 30);
    }

    #[test]
    fn directory_of_stills_decodes_in_name_order() {
        let dir = std::env::temp_dir().join(format!("glyphscape-stills-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        solid(200).save(dir.join("b.png")).unwrap();
        solid(100).save(dir.join("a.png")).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let clip = decode_clip(&dir, &AtomicBool::new(false)).unwrap();
        assert_eq!(clip.len(), 2);
        assert_eq!(clip.frame_at(Duration::ZERO).unwrap().get_pixel(0, 0).0[0], 100);
        assert_eq!(clip.duration(), STILLS_FRAME * 2);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_path_is_an_io_error() {
        let err = decode_clip(Path::new("/definitely/not/here.gif"), &AtomicBool::new(false)).err().unwrap();
        assert!(matches!(err, VideoError::Io { .. }));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let file = std::env::temp_dir().join(format!("glyphscape-notes-{}.txt", std::process::id()));
        fs::write(&file, "not an image").unwrap();
        let err = decode_clip(&file, &AtomicBool::new(false)).err().unwrap();
        assert!(matches!(err, VideoError::Unsupported(_)));
        fs::remove_file(&file).ok();
    }

    #[test]
    fn set_cancel_flag_abandons_the_decode() {
        let dir = std::env::temp_dir().join(format!("glyphscape-cancel-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        solid(10).save(dir.join("a.png")).unwrap();
        solid(20).save(dir.join("b.png")).unwrap();

        let err = decode_clip(&dir, &AtomicBool::new(true)).err().unwrap();
        assert!(matches!(err, VideoError::Cancelled(_)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn dropping_the_source_signals_its_decoder() {
        let src = DecodedSource::spawn(PathBuf::from("/definitely/not/here"));
        let flag = Arc::clone(&src.cancel);
        assert!(!flag.load(Ordering::Relaxed));
        drop(src);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn background_decode_becomes_ready() {
        let dir = std::env::temp_dir().join(format!("glyphscape-bg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("still.png");
        solid(77).save(&file).unwrap();

        let mut src = DecodedSource::spawn(file);
        let mut state = src.poll();
        for _ in 0..500 {
            if state != Readiness::Pending {
                break;
            }
            thread::sleep(Duration::from_millis(10));
            state = src.poll();
        }
        assert_eq!(state, Readiness::Ready);
        assert_eq!(src.frame_at(Duration::from_secs(3)).unwrap().get_pixel(1, 1).0[0], 77);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_fails_without_panicking() {
        let dir = std::env::temp_dir().join(format!("glyphscape-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut src = DecodedSource::spawn(dir.clone());
        let mut state = src.poll();
        for _ in 0..500 {
            if state != Readiness::Pending {
                break;
            }
            thread::sleep(Duration::from_millis(10));
            state = src.poll();
        }
        assert!(matches!(state, Readiness::Failed(_)));
        assert!(src.frame_at(Duration::ZERO).is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn pattern_moves_over_time() {
        let mut src = PatternSource::new();
        let a = src.frame_at(Duration::ZERO).unwrap().clone();
        let b = src.frame_at(Duration::from_secs(2)).unwrap().clone();
        assert_eq!(a.dimensions(), (PatternSource::WIDTH, PatternSource::HEIGHT));
        assert_ne!(a, b);
    }
}

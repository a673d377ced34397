use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::{Duration, Instant};

use super::geometry::{CropRegion, center_square};
use super::native::load_dynamic_image;
use super::saliency::SaliencyFinder;
use super::ImageBackend;

static DIMENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)x(\d+)").expect("dimension pattern is valid"));

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Backend that shells out to ImageMagick's `magick` and `identify`.
pub struct MagickBackend {
    magick: String,
    identify: String,
    probe_timeout: Duration,
    command_timeout: Duration,
    saliency: Arc<dyn SaliencyFinder>,
}

impl MagickBackend {
    pub fn new(
        magick: String,
        identify: String,
        probe_timeout: Duration,
        command_timeout: Duration,
        saliency: Arc<dyn SaliencyFinder>,
    ) -> Self {
        Self {
            magick,
            identify,
            probe_timeout,
            command_timeout,
            saliency,
        }
    }

    fn magick_command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.magick);
        cmd.args(args);
        cmd
    }

    /// Run an ImageMagick transform and confirm it produced `destination`.
    fn transform(&self, mut cmd: Command, destination: &Path) -> Result<()> {
        run_with_timeout(&mut cmd, self.command_timeout)?;
        if !destination.is_file() {
            bail!("{} exited cleanly but wrote no {:?}", self.magick, destination);
        }
        Ok(())
    }
}

impl ImageBackend for MagickBackend {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn probe(&self) -> Result<String> {
        let mut cmd = self.magick_command(["--version"]);
        let output = run_with_timeout(&mut cmd, self.probe_timeout)
            .context(format!("`{}` is not installed or not available in PATH", self.magick))?;
        let version_number = output
            .lines()
            .next()
            .unwrap_or("Unknown version")
            .split_whitespace()
            .nth(2)
            .unwrap_or("Unknown")
            .to_string();
        Ok(version_number)
    }

    fn dimensions(&self, source: &Path) -> Result<(u32, u32)> {
        let mut cmd = Command::new(&self.identify);
        cmd.args([
            OsStr::new("-format"),
            OsStr::new("%wx%h"),
            first_frame(source).as_os_str(),
        ]);
        let output = run_with_timeout(&mut cmd, self.command_timeout)
            .context(format!("failed to identify {:?}", source))?;
        parse_dimensions(&output)
    }

    fn convert(&self, source: &Path, destination: &Path) -> Result<()> {
        let cmd = self.magick_command([first_frame(source).as_os_str(), destination.as_os_str()]);
        self.transform(cmd, destination)
            .context(format!("failed to convert {:?}", source))
    }

    fn center_crop(
        &self,
        source: &Path,
        destination: &Path,
        target_size: u32,
    ) -> Result<CropRegion> {
        let (width, height) = self.dimensions(source)?;
        let region = center_square(width, height);
        let cmd = self.magick_command([
            first_frame(source).as_os_str(),
            OsStr::new("-crop"),
            OsStr::new(&region.to_geometry()),
            OsStr::new("+repage"),
            OsStr::new("-resize"),
            OsStr::new(&format!("{target_size}x{target_size}!")),
            destination.as_os_str(),
        ]);
        self.transform(cmd, destination)
            .context(format!("failed to center crop {:?}", source))?;
        Ok(region)
    }

    fn salient_crop(
        &self,
        source: &Path,
        destination: &Path,
        target_size: u32,
    ) -> Result<CropRegion> {
        let rgb_image = load_dynamic_image(source)?.to_rgb8();
        let region = self
            .saliency
            .find(&rgb_image, target_size, target_size)
            .context("saliency detection failed")?;
        let cmd = self.magick_command([
            first_frame(source).as_os_str(),
            OsStr::new("-crop"),
            OsStr::new(&region.to_geometry()),
            OsStr::new("+repage"),
            OsStr::new("-filter"),
            OsStr::new("Lanczos"),
            OsStr::new("-resize"),
            OsStr::new(&format!("{target_size}x{target_size}!")),
            destination.as_os_str(),
        ]);
        self.transform(cmd, destination)
            .context(format!("failed to crop {:?} to {:?}", source, region))?;
        Ok(region)
    }

    fn fill_crop(&self, source: &Path, destination: &Path, target_size: u32) -> Result<()> {
        let extent = format!("{target_size}x{target_size}");
        let cmd = self.magick_command([
            first_frame(source).as_os_str(),
            OsStr::new("-resize"),
            OsStr::new(&format!("{extent}^")),
            OsStr::new("-gravity"),
            OsStr::new("center"),
            OsStr::new("-extent"),
            OsStr::new(&extent),
            destination.as_os_str(),
        ]);
        self.transform(cmd, destination)
            .context(format!("failed to fill crop {:?}", source))
    }
}

/// `source[0]`: ImageMagick reads only the first frame of animated or multi-page files.
fn first_frame(source: &Path) -> OsString {
    let mut selector = source.as_os_str().to_os_string();
    selector.push("[0]");
    selector
}

fn parse_dimensions(output: &str) -> Result<(u32, u32)> {
    let captures = DIMENSIONS
        .captures(output)
        .ok_or_else(|| anyhow!("unexpected identify output: {:?}", output.trim()))?;
    let width = captures[1].parse().context("width out of range")?;
    let height = captures[2].parse().context("height out of range")?;
    Ok((width, height))
}

/// Run `cmd` to completion, killing it after `timeout`. Returns captured stdout.
///
/// Stdout is drained on its own thread so a chatty child never blocks on a full pipe.
fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context(format!("failed to execute {}", program))?;

    let reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || -> std::io::Result<String> {
            let mut stdout = String::new();
            pipe.read_to_string(&mut stdout)?;
            Ok(stdout)
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            // The reader is left detached: grandchildren may still hold the pipe open.
            bail!("{} timed out after {:?}", program, timeout);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow!("output reader for {} panicked", program))?
            .context(format!("failed to read output of {}", program))?,
        None => String::new(),
    };

    if !status.success() {
        return Err(anyhow!(
            "{} failed with exit code: {}",
            program,
            status.code().unwrap_or(-1)
        ));
    }
    debug!("{} finished: {}", program, status);
    Ok(stdout)
}

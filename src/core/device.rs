//! Modem power and reset control
//!
//! Some boards wire the modem's power and reset lines to the host. The
//! Calypso modem must be power cycled and reset through them before it
//! answers AT commands.

use super::protocol::line::{read_byte, read_line};
use super::protocol::ModemError;
use super::transport::ModemStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Sysfs directory of the GTA02 modem power management driver
pub const DEFAULT_SYSFS_DIR: &str = "/sys/devices/platform/neo1973-pm-gsm.0";

/// Power and reset lines of a modem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceControl: Send {
    /// Drive the power line
    async fn set_power(&mut self, on: bool) -> Result<(), ModemError>;

    /// Drive the reset line
    async fn set_reset(&mut self, asserted: bool) -> Result<(), ModemError>;
}

/// [`DeviceControl`] through the `power_on` and `reset` sysfs attributes
#[derive(Debug, Clone)]
pub struct SysfsControl {
    dir: PathBuf,
}

impl Default for SysfsControl {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_DIR)
    }
}

impl SysfsControl {
    /// Control files under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the control files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_flag(&self, attribute: &str, value: bool) -> Result<(), ModemError> {
        let path = self.dir.join(attribute);
        let value = if value { "1" } else { "0" };
        tracing::debug!("{} <- {}", path.display(), value);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| ModemError::Reset(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl DeviceControl for SysfsControl {
    async fn set_power(&mut self, on: bool) -> Result<(), ModemError> {
        self.write_flag("power_on", on).await
    }

    async fn set_reset(&mut self, asserted: bool) -> Result<(), ModemError> {
        self.write_flag("reset", asserted).await
    }
}

/// A vendor reset sequence, run over the modem stream
#[async_trait]
pub trait ModemReset: Send {
    /// Bring the modem to the point where it accepts AT commands
    async fn reset(&mut self, link: &mut dyn ModemStream, timeout: Duration) -> Result<(), ModemError>;
}

/// Modems that need no reset
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReset;

#[async_trait]
impl ModemReset for NoReset {
    async fn reset(&mut self, _link: &mut dyn ModemStream, _timeout: Duration) -> Result<(), ModemError> {
        Ok(())
    }
}

/// Pauses of the Calypso reset sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTimings {
    /// After power off
    pub power_off: Duration,
    /// After power on
    pub power_on: Duration,
    /// Reset line held asserted
    pub reset_pulse: Duration,
    /// After reset release, before the ready banner
    pub boot: Duration,
}

impl Default for ResetTimings {
    fn default() -> Self {
        Self {
            power_off: Duration::from_secs(1),
            power_on: Duration::from_secs(1),
            reset_pulse: Duration::from_secs(1),
            boot: Duration::from_secs(4),
        }
    }
}

/// TI Calypso reset: power cycle, reset pulse, wait for the banner
pub struct CalypsoReset<D> {
    control: D,
    timings: ResetTimings,
}

impl<D: DeviceControl> CalypsoReset<D> {
    /// Reset sequence with the stock timings
    pub fn new(control: D) -> Self {
        Self::with_timings(control, ResetTimings::default())
    }

    /// Reset sequence with custom timings
    pub fn with_timings(control: D, timings: ResetTimings) -> Self {
        Self { control, timings }
    }
}

#[async_trait]
impl<D: DeviceControl> ModemReset for CalypsoReset<D> {
    async fn reset(&mut self, link: &mut dyn ModemStream, timeout: Duration) -> Result<(), ModemError> {
        tracing::info!("turn modem off");
        self.control.set_power(false).await?;
        tokio::time::sleep(self.timings.power_off).await;

        tracing::info!("turn modem on");
        self.control.set_power(true).await?;
        tokio::time::sleep(self.timings.power_on).await;

        tracing::info!("reset modem");
        self.control.set_reset(true).await?;
        tokio::time::sleep(self.timings.reset_pulse).await;
        self.control.set_reset(false).await?;
        tokio::time::sleep(self.timings.boot).await;

        let banner = read_line(link, timeout).await?;
        tracing::info!("got ready message: {:?}", banner);

        tracing::info!("send empty command to calypso");
        link.write_all(b"\r").await?;
        link.flush().await?;
        match read_byte(link, timeout).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Reset sequence selected in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetKind {
    /// No reset
    #[default]
    None,
    /// [`CalypsoReset`] over [`SysfsControl`]
    Calypso,
}

impl std::str::FromStr for ResetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "calypso" => Ok(Self::Calypso),
            other => Err(format!("unknown reset kind '{other}'")),
        }
    }
}

impl ResetKind {
    /// Build the reset sequence, Calypso lines under `sysfs_dir`
    pub fn build(self, sysfs_dir: &Path) -> Box<dyn ModemReset> {
        match self {
            Self::None => Box::new(NoReset),
            Self::Calypso => Box::new(CalypsoReset::new(SysfsControl::new(sysfs_dir))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use tokio_test::io::Builder;

    fn ordered_control() -> MockDeviceControl {
        let mut control = MockDeviceControl::new();
        let mut seq = Sequence::new();
        control
            .expect_set_power()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
            .expect_set_power()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
            .expect_set_reset()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
            .expect_set_reset()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
    }

    #[tokio::test(start_paused = true)]
    async fn test_calypso_sequence() {
        let mut link = Builder::new()
            .read(b"AT-Command Interpreter ready\r\n")
            .write(b"\r")
            .read(b"\n")
            .build();
        let mut reset = CalypsoReset::new(ordered_control());

        let start = tokio::time::Instant::now();
        reset.reset(&mut link, Duration::from_secs(10)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calypso_drain_tolerates_silence() {
        let mut link = Builder::new()
            .read(b"ready\r\n")
            .write(b"\r")
            .wait(Duration::from_secs(60))
            .build();
        let mut reset = CalypsoReset::new(ordered_control());

        reset.reset(&mut link, Duration::from_secs(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_calypso_missing_banner_times_out() {
        let mut link = Builder::new().wait(Duration::from_secs(60)).build();
        let mut reset = CalypsoReset::new(ordered_control());

        let err = reset.reset(&mut link, Duration::from_secs(10)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_calypso_stops_on_control_failure() {
        let mut control = MockDeviceControl::new();
        control
            .expect_set_power()
            .times(1)
            .returning(|_| Err(ModemError::Reset("power_on: permission denied".into())));
        control.expect_set_reset().times(0);
        let mut link = Builder::new().build();
        let mut reset = CalypsoReset::new(control);

        let err = reset.reset(&mut link, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ModemError::Reset(_)));
    }

    #[tokio::test]
    async fn test_sysfs_writes_flags() {
        let dir = tempfile::tempdir().unwrap();
        let mut control = SysfsControl::new(dir.path());

        control.set_power(true).await.unwrap();
        control.set_reset(false).await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("power_on")).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(dir.path().join("reset")).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_sysfs_missing_dir_is_reset_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut control = SysfsControl::new(dir.path().join("absent"));

        let err = control.set_power(false).await.unwrap_err();
        assert!(matches!(err, ModemError::Reset(_)));
    }

    #[test]
    fn test_reset_kind_from_str() {
        assert_eq!("Calypso".parse::<ResetKind>().unwrap(), ResetKind::Calypso);
        assert!("siemens".parse::<ResetKind>().is_err());
        assert_eq!(SysfsControl::default().dir(), Path::new(DEFAULT_SYSFS_DIR));
    }
}

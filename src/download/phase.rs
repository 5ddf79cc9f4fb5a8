use std::time::Duration;

use crate::constants::{
    PROGRESS_COMPLETE, PROGRESS_DIVISOR, PROGRESS_SCALE, STATUS_DOWNLOAD_STARTING,
    STATUS_DOWNLOAD_VERIFYING,
};
use crate::models::UseCase;
use crate::utils::ParleyError;

/// Where model acquisition currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPhase {
    NoUseCase,
    Deploying,
    Deployed(UseCase),
    /// `progress` is a percentage with two decimals of precision
    Downloading { model_id: String, progress: f64 },
    Verifying { model_id: String },
    Ready { model_id: String },
    Failed(ParleyError),
    Cancelled { model_id: String },
}

impl DownloadPhase {
    /// True while a deploy or download is running
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Deploying | Self::Downloading { .. } | Self::Verifying { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ready { .. } | Self::Failed(_) | Self::Cancelled { .. }
        )
    }

    /// Status line for the host
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::NoUseCase | Self::Deployed(_) => None,
            Self::Deploying => Some("Deploying use case, please wait.".to_string()),
            Self::Downloading { progress, .. } if *progress == 0.0 => {
                Some(STATUS_DOWNLOAD_STARTING.to_string())
            }
            Self::Downloading { model_id, progress } => Some(format!(
                "Downloading {}: {}%",
                model_id,
                format_percent(*progress)
            )),
            Self::Verifying { .. } => Some(STATUS_DOWNLOAD_VERIFYING.to_string()),
            Self::Ready { model_id } => Some(format!("{} is ready", model_id)),
            Self::Failed(err) => Some(err.user_message()),
            Self::Cancelled { model_id } => Some(format!("Download of {} cancelled", model_id)),
        }
    }
}

/// `ceil(bytes / total * 10000) / 100`; zero when the total is unknown
pub fn progress_percent(bytes_transferred: f64, total_bytes: f64) -> f64 {
    if total_bytes <= 0.0 {
        return 0.0;
    }
    (bytes_transferred / total_bytes * PROGRESS_SCALE).ceil() / PROGRESS_DIVISOR
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.2}", percent)
}

pub fn is_complete(percent: f64) -> bool {
    format_percent(percent) == PROGRESS_COMPLETE
}

/// Elapsed time as `mm:ss`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounds_up() {
        assert_eq!(progress_percent(50.0, 100.0), 50.0);
        assert_eq!(progress_percent(1.0, 3.0), 33.34);
        assert_eq!(progress_percent(10.0, 0.0), 0.0);
        assert_eq!(format_percent(progress_percent(1.0, 3.0)), "33.34");
    }

    #[test]
    fn test_completion_detection() {
        assert!(is_complete(progress_percent(100.0, 100.0)));
        assert!(!is_complete(progress_percent(90.0, 100.0)));
    }

    #[test]
    fn test_elapsed_format() {
        assert_eq!(format_elapsed(Duration::from_secs(65)), "01:05");
        assert_eq!(format_elapsed(Duration::from_millis(900)), "00:00");
    }

    #[test]
    fn test_status_messages() {
        let starting = DownloadPhase::Downloading {
            model_id: "m1".into(),
            progress: 0.0,
        };
        assert_eq!(starting.status_message().as_deref(), Some("Download starting..."));
        assert!(starting.is_busy());

        let failed = DownloadPhase::Failed(ParleyError::Verification("m1 missing".into()));
        assert_eq!(
            failed.status_message().as_deref(),
            Some("Download Failed: m1 missing")
        );
        assert!(failed.is_terminal());
    }
}

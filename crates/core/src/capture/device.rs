use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use tracing::{error, info};

use crate::{
    analysis::SharedAnalyser,
    events::{EventSender, EventSink, MICROPHONE},
    CaptureError,
};

use super::{Capture, CaptureHandle, Liveness, CAPTURE_INTERRUPTED};

/// Capture from the host's default input device.
///
/// Multi-channel devices are reduced to their first channel. Any stream
/// error ends the capture.
#[derive(Debug, Default)]
pub struct DeviceCapture;

impl DeviceCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Capture for DeviceCapture {
    fn name(&self) -> &str {
        "device"
    }

    fn start(
        &mut self,
        analyser: SharedAnalyser,
        events: EventSender,
    ) -> Result<CaptureHandle, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::DeviceUnavailable)?;
        let name = device.name().unwrap_or_else(|_| "default input".to_string());

        let supported = device
            .default_input_config()
            .map_err(|err| match err {
                cpal::DefaultStreamConfigError::DeviceNotAvailable
                | cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                    CaptureError::DeviceUnavailable
                }
                cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                    backend_error(&err.description)
                }
            })?;

        let channels = supported.channels().max(1) as usize;
        let sample_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let liveness = Liveness::new();

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, analyser, liveness.clone(), events),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, analyser, liveness.clone(), events),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, analyser, liveness.clone(), events),
            other => Err(CaptureError::InitFailed(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|err| CaptureError::InitFailed(format!("failed to start audio stream: {err}")))?;
        info!(device = %name, sample_rate, channels, "audio capture stream started");

        Ok(CaptureHandle::new(name, sample_rate, liveness).with_guard(Box::new(stream)))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    analyser: SharedAnalyser,
    liveness: Liveness,
    mut events: EventSender,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let mut mono: Vec<f32> = Vec::new();
    let alive = liveness.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !liveness.is_alive() {
                    return;
                }
                mono.clear();
                mono.extend(data.chunks(channels).map(|frame| f32::from_sample(frame[0])));
                if let Err(err) = analyser.push_samples(&mono) {
                    error!(error = %err, "dropping captured block");
                }
            },
            move |err| {
                error!(error = %err, "audio capture error");
                if alive.is_alive() {
                    alive.release();
                    events.record(CAPTURE_INTERRUPTED, MICROPHONE);
                }
            },
            None,
        )
        .map_err(|err| match err {
            cpal::BuildStreamError::DeviceNotAvailable
            | cpal::BuildStreamError::StreamConfigNotSupported => CaptureError::DeviceUnavailable,
            cpal::BuildStreamError::BackendSpecific { err } => backend_error(&err.description),
            other => CaptureError::InitFailed(other.to_string()),
        })
}

/// Backends report denied microphone access only through their message text.
fn backend_error(description: &str) -> CaptureError {
    let lowered = description.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("not authorized") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::InitFailed(description.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_messages_map_to_permission_denied() {
        assert_eq!(
            backend_error("Permission denied (os error 13)"),
            CaptureError::PermissionDenied
        );
        assert!(matches!(
            backend_error("ALSA function failed"),
            CaptureError::InitFailed(_)
        ));
    }
}

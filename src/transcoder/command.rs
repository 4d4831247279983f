//! Encoder argument builder
//!
//! Pure function from (channel, effective settings, logo root, GPU probe
//! result) to the ordered `ffmpeg` argument vector. Same inputs produce the
//! identical vector; the only filesystem access is the logo existence check.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::TranscoderConfig;
use crate::errors::TranscoderError;
use crate::models::{Channel, Settings};

/// Effective encoding parameters for one spawn.
///
/// Precedence: channel output config > settings store > built-in config
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub preset: String,
    pub resolution: String,
    pub profile: String,
    pub crf: i64,
    pub maxrate: String,
    pub bufsize: String,
    pub segment_time: i64,
    pub playlist_size: i64,
    /// 0 lets the encoder pick its own thread count
    pub threads: i64,
}

impl EncoderSettings {
    pub fn resolve(config: &TranscoderConfig, settings: &Settings, channel: &Channel) -> Self {
        let mut preset = non_empty_or(&settings.default_preset, &config.default_preset);
        let mut resolution = non_empty_or(&settings.default_resolution, "1920x1080");
        let mut profile = non_empty_or(&settings.default_profile, "high");
        let mut maxrate = non_empty_or(&settings.default_maxrate, &config.default_bitrate);
        let bufsize = non_empty_or(&settings.default_bufsize, "");

        if let Some(output) = &channel.output_config {
            if !output.preset.is_empty() {
                preset = output.preset.clone();
            }
            if !output.resolution.is_empty() {
                resolution = output.resolution.clone();
            }
            if !output.profile.is_empty() {
                profile = output.profile.clone();
            }
            // A channel-level bitrate caps the rate control directly
            if !output.bitrate.is_empty() {
                maxrate = output.bitrate.clone();
            }
        }

        let bufsize = if bufsize.is_empty() {
            derive_bufsize(&maxrate)
        } else {
            bufsize
        };

        let segment_time = if settings.segment_time > 0 {
            settings.segment_time
        } else {
            config.segment_time
        };
        let playlist_size = if settings.playlist_size > 0 {
            settings.playlist_size
        } else {
            config.playlist_size
        };

        Self {
            preset,
            resolution,
            profile,
            crf: settings.default_crf,
            maxrate,
            bufsize,
            segment_time,
            playlist_size,
            threads: settings.threads_per_process.max(0),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Double the maxrate: "3800k" → "7600k", "4M" → "8M". Unparseable rates
/// keep a flat default.
fn derive_bufsize(maxrate: &str) -> String {
    let (digits, suffix) = match maxrate.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => maxrate.split_at(pos),
        None => (maxrate, ""),
    };
    match digits.parse::<i64>() {
        Ok(value) => format!("{}{}", value * 2, suffix),
        Err(_) => "10000k".to_string(),
    }
}

/// "1920x1080" → (1920, 1080); malformed strings fall back to 1080p
fn parse_resolution(resolution: &str) -> (i64, i64) {
    if let Some((w, h)) = resolution.split_once('x')
        && let (Ok(width), Ok(height)) = (w.parse::<i64>(), h.parse::<i64>())
        && width > 0
        && height > 0
    {
        return (width, height);
    }
    (1920, 1080)
}

/// Build the full encoder argument vector for one channel.
///
/// The logo path is resolved against `logo_root` unless absolute; a missing
/// file is a deterministic error and nothing is spawned.
pub fn build_args(
    channel: &Channel,
    settings: &EncoderSettings,
    logo_root: &Path,
    use_gpu: bool,
    output_dir: &Path,
) -> Result<Vec<String>, TranscoderError> {
    debug!(
        channel_id = %channel.id,
        preset = %settings.preset,
        use_gpu,
        "building encoder arguments"
    );

    let (width, height) = parse_resolution(&settings.resolution);
    let segment_time = settings.segment_time;
    let gop = segment_time * 30;

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
        "-progress".into(),
        "pipe:2".into(),
        "-reconnect".into(),
        "1".into(),
        "-reconnect_streamed".into(),
        "1".into(),
        "-reconnect_delay_max".into(),
        "2".into(),
        "-reconnect_at_eof".into(),
        "1".into(),
        "-timeout".into(),
        "5000000".into(),
        "-fflags".into(),
        "+genpts+discardcorrupt+nobuffer".into(),
        "-analyzeduration".into(),
        "2000000".into(),
        "-probesize".into(),
        "2000000".into(),
        "-thread_queue_size".into(),
        "512".into(),
        "-i".into(),
        channel.source_url.clone(),
    ];

    // Filter graph: scale the primary video, overlay the logo when present
    match &channel.logo {
        Some(logo) if !logo.path.is_empty() => {
            let logo_path = if Path::new(&logo.path).is_absolute() {
                PathBuf::from(&logo.path)
            } else {
                logo_root.join(&logo.path)
            };

            if !logo_path.exists() {
                return Err(TranscoderError::LogoNotFound(logo_path));
            }

            args.push("-i".into());
            args.push(logo_path.to_string_lossy().into_owned());

            let filter = format!(
                "[0:v]scale={width}:{height}[scaled];\
                 [1:v]scale={}:{},format=rgba,colorchannelmixer=aa={:.6}[logo];\
                 [scaled][logo]overlay={}:{}[vout]",
                logo.width, logo.height, logo.opacity, logo.x, logo.y
            );
            args.push("-filter_complex".into());
            args.push(filter);
        }
        _ => {
            args.push("-filter_complex".into());
            args.push(format!("[0:v]scale={width}:{height}[vout]"));
        }
    }

    args.push("-map".into());
    args.push("[vout]".into());
    args.push("-map".into());
    args.push("0:a".into());

    if use_gpu {
        args.extend(
            [
                "-c:v",
                "h264_nvenc",
                "-preset",
                "p4",
                "-tune",
                "ull",
                "-rc",
                "vbr",
            ]
            .map(String::from),
        );
        args.push("-cq".into());
        args.push(settings.crf.to_string());
        args.push("-maxrate".into());
        args.push(settings.maxrate.clone());
        args.push("-bufsize".into());
        args.push(settings.bufsize.clone());
        args.push("-profile:v".into());
        args.push(settings.profile.clone());
        args.extend(["-level", "4.1", "-pix_fmt", "yuv420p"].map(String::from));
        args.push("-g".into());
        args.push(gop.to_string());
        args.push("-keyint_min".into());
        args.push((gop / 2).to_string());
        args.push("-force_key_frames".into());
        args.push(format!("expr:gte(t,n_forced*{segment_time})"));
        args.extend(["-bf", "0", "-gpu", "any"].map(String::from));
    } else {
        args.push("-c:v".into());
        args.push("libx264".into());
        args.push("-preset".into());
        args.push(settings.preset.clone());
        args.extend(["-tune", "zerolatency"].map(String::from));
        args.push("-crf".into());
        args.push(settings.crf.to_string());
        args.push("-maxrate".into());
        args.push(settings.maxrate.clone());
        args.push("-bufsize".into());
        args.push(settings.bufsize.clone());
        args.push("-profile:v".into());
        args.push(settings.profile.clone());
        args.extend(["-level", "4.1", "-pix_fmt", "yuv420p"].map(String::from));
        args.push("-g".into());
        args.push(gop.to_string());
        args.push("-keyint_min".into());
        args.push((gop / 2).to_string());
        args.extend(["-sc_threshold", "0"].map(String::from));
        args.push("-force_key_frames".into());
        args.push(format!("expr:gte(t,n_forced*{segment_time})"));
        args.push("-threads".into());
        args.push(settings.threads.to_string());
        args.extend(["-x264opts", "nal-hrd=cbr:force-cfr=1", "-bf", "0"].map(String::from));
    }

    // AAC stereo at broadcast-friendly defaults
    args.extend(["-c:a", "aac", "-b:a", "128k", "-ar", "48000", "-ac", "2"].map(String::from));

    args.push("-f".into());
    args.push("hls".into());
    args.push("-hls_time".into());
    args.push(segment_time.to_string());
    args.push("-hls_list_size".into());
    args.push(settings.playlist_size.to_string());
    args.push("-hls_flags".into());
    args.push("delete_segments+independent_segments+program_date_time".into());
    args.extend(["-hls_delete_threshold", "1"].map(String::from));
    args.push("-hls_segment_filename".into());
    args.push(
        output_dir
            .join("segment_%05d.ts")
            .to_string_lossy()
            .into_owned(),
    );
    args.extend(
        [
            "-hls_segment_type",
            "mpegts",
            "-start_number",
            "0",
            "-avoid_negative_ts",
            "make_zero",
            "-max_muxing_queue_size",
            "1024",
            "-muxdelay",
            "0",
            "-muxpreload",
            "0",
        ]
        .map(String::from),
    );
    args.push(output_dir.join("index.m3u8").to_string_lossy().into_owned());

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogoConfig, OutputConfig};

    fn test_settings() -> EncoderSettings {
        EncoderSettings::resolve(
            &TranscoderConfig::default(),
            &Settings::default(),
            &Channel::new("test", "http://example.com/in.m3u8"),
        )
    }

    fn channel() -> Channel {
        let mut channel = Channel::new("test", "http://example.com/in.m3u8");
        channel.output_config = None;
        channel
    }

    #[test]
    fn cpu_path_uses_libx264_with_hrd_options() {
        let dir = PathBuf::from("/tmp/out");
        let args = build_args(&channel(), &test_settings(), Path::new("/logos"), false, &dir)
            .unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-tune zerolatency"));
        assert!(joined.contains("-x264opts nal-hrd=cbr:force-cfr=1"));
        assert!(joined.contains("-bf 0"));
        assert!(!joined.contains("h264_nvenc"));
    }

    #[test]
    fn gpu_path_uses_nvenc_low_latency() {
        let dir = PathBuf::from("/tmp/out");
        let args =
            build_args(&channel(), &test_settings(), Path::new("/logos"), true, &dir).unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("-c:v h264_nvenc"));
        assert!(joined.contains("-tune ull"));
        assert!(joined.contains("-rc vbr"));
        assert!(joined.contains("-gpu any"));
        assert!(!joined.contains("libx264"));
    }

    #[test]
    fn input_block_keeps_startup_bounded() {
        let dir = PathBuf::from("/tmp/out");
        let args =
            build_args(&channel(), &test_settings(), Path::new("/logos"), false, &dir).unwrap();

        let joined = args.join(" ");
        assert!(joined.starts_with("-hide_banner -loglevel warning -progress pipe:2"));
        assert!(joined.contains("-reconnect_delay_max 2"));
        assert!(joined.contains("-timeout 5000000"));
        assert!(joined.contains("-analyzeduration 2000000"));
        assert!(joined.contains("-thread_queue_size 512"));
        assert!(joined.contains("-i http://example.com/in.m3u8"));
    }

    #[test]
    fn hls_output_block_is_complete() {
        let dir = PathBuf::from("/srv/hls/abc");
        let settings = test_settings();
        let args = build_args(&channel(), &settings, Path::new("/logos"), false, &dir).unwrap();

        let joined = args.join(" ");
        assert!(joined.contains(&format!("-hls_time {}", settings.segment_time)));
        assert!(joined.contains(&format!("-hls_list_size {}", settings.playlist_size)));
        assert!(joined.contains("delete_segments+independent_segments+program_date_time"));
        assert!(joined.contains("/srv/hls/abc/segment_%05d.ts"));
        assert!(args.last().unwrap().ends_with("/srv/hls/abc/index.m3u8"));
    }

    #[test]
    fn missing_logo_is_a_deterministic_error() {
        let mut channel = channel();
        channel.logo = Some(LogoConfig {
            path: "missing.png".to_string(),
            x: 10,
            y: 10,
            width: 100,
            height: 50,
            opacity: 0.8,
        });

        let err = build_args(
            &channel,
            &test_settings(),
            Path::new("/nonexistent-logo-root"),
            false,
            Path::new("/tmp/out"),
        )
        .unwrap_err();

        assert!(matches!(err, TranscoderError::LogoNotFound(_)));
    }

    #[test]
    fn logo_builds_overlay_filter_graph() {
        let logo_root = tempfile::tempdir().unwrap();
        std::fs::write(logo_root.path().join("brand.png"), b"png").unwrap();

        let mut channel = channel();
        channel.logo = Some(LogoConfig {
            path: "brand.png".to_string(),
            x: 20,
            y: 30,
            width: 160,
            height: 90,
            opacity: 0.5,
        });

        let args = build_args(
            &channel,
            &test_settings(),
            logo_root.path(),
            false,
            Path::new("/tmp/out"),
        )
        .unwrap();

        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        let filter = &args[filter_pos + 1];
        assert!(filter.contains("[0:v]scale=1920:1080[scaled]"));
        assert!(filter.contains("scale=160:90,format=rgba,colorchannelmixer=aa=0.500000[logo]"));
        assert!(filter.contains("[scaled][logo]overlay=20:30[vout]"));

        // The logo became a second input
        let inputs: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn channel_output_config_overrides_settings() {
        let config = TranscoderConfig::default();
        let store_settings = Settings::default();
        let mut channel = channel();
        channel.output_config = Some(OutputConfig {
            codec: "libx264".to_string(),
            bitrate: "2000k".to_string(),
            resolution: "1280x720".to_string(),
            preset: "slow".to_string(),
            profile: "main".to_string(),
        });

        let effective = EncoderSettings::resolve(&config, &store_settings, &channel);
        assert_eq!(effective.preset, "slow");
        assert_eq!(effective.resolution, "1280x720");
        assert_eq!(effective.profile, "main");
        assert_eq!(effective.maxrate, "2000k");
    }

    #[test]
    fn bufsize_derives_from_maxrate_when_unset() {
        assert_eq!(derive_bufsize("3800k"), "7600k");
        assert_eq!(derive_bufsize("4M"), "8M");
        assert_eq!(derive_bufsize("garbage"), "10000k");
    }

    #[test]
    fn resolution_parsing_falls_back_to_1080p() {
        assert_eq!(parse_resolution("1280x720"), (1280, 720));
        assert_eq!(parse_resolution("bogus"), (1920, 1080));
        assert_eq!(parse_resolution("0x0"), (1920, 1080));
    }

    #[test]
    fn same_inputs_produce_identical_vectors() {
        let dir = PathBuf::from("/tmp/out");
        let a = build_args(&channel(), &test_settings(), Path::new("/logos"), false, &dir).unwrap();
        let b = build_args(&channel(), &test_settings(), Path::new("/logos"), false, &dir).unwrap();
        assert_eq!(a, b);
    }
}

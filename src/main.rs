//! RustDioStreamer - Main entry point
//!
//! 1. Bring up the log UART
//! 2. Board defaults, then NVS overrides
//! 3. Configure lines and the USB link
//! 4. Hand everything to the session loop (never returns)

#[cfg(target_os = "espidf")]
fn main() {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    println!("{} targets the ESP32-S3; build with the espidf toolchain", env!("CARGO_PKG_NAME"));
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::peripherals::Peripherals;

    use rust_dio_streamer::config::{board, nvs, StreamerConfig};
    use rust_dio_streamer::hal::{EspLines, EspPlatform, EspTimer, EspUsbLink, UartLogConfig, UartLogPort};
    use rust_dio_streamer::link::Timer;
    use rust_dio_streamer::logging::LogStream;
    use rust_dio_streamer::{rt_error, rt_info, rt_warn, Session};

    static LOG_STREAM: LogStream = LogStream::new();

    /// Nothing left to do but keep the watchdog fed.
    fn park(log: Option<&mut UartLogPort>) -> ! {
        if let Some(port) = log {
            LOG_STREAM.drain_to(port);
        }
        loop {
            FreeRtos::delay_ms(1000);
        }
    }

    pub fn run() -> ! {
        esp_idf_svc::sys::link_patches();

        let timer = EspTimer;

        let Ok(peripherals) = Peripherals::take() else {
            park(None);
        };

        let mut log = match UartLogPort::new(
            peripherals.uart1,
            peripherals.pins.gpio6,
            &UartLogConfig::default(),
        ) {
            Ok(port) => port,
            Err(_) => park(None),
        };

        rt_info!(LOG_STREAM, timer.now_us(), "{}", env!("VERSION_STRING"));

        let base = match StreamerConfig::board_default() {
            Ok(config) => config,
            Err(e) => {
                rt_error!(LOG_STREAM, timer.now_us(), "board table invalid: {}", e);
                park(Some(&mut log));
            }
        };

        let config = match nvs::load_config(base) {
            Ok((config, result)) => {
                rt_info!(LOG_STREAM, timer.now_us(), "NVS config: {:?}", result);
                config
            }
            Err(e) => {
                rt_warn!(LOG_STREAM, timer.now_us(), "NVS config unusable ({}), using defaults", e);
                base
            }
        };
        LOG_STREAM.drain_to(&mut log);

        if let Err(e) = config.validate() {
            rt_error!(LOG_STREAM, timer.now_us(), "configuration rejected: {}", e);
            park(Some(&mut log));
        }

        let lines = match EspLines::new(&config.pins, board::SYNC_LINE, board::STATUS_LINE) {
            Ok(lines) => lines,
            Err(e) => {
                rt_error!(LOG_STREAM, timer.now_us(), "GPIO setup failed: {}", e);
                park(Some(&mut log));
            }
        };

        let platform = EspPlatform {
            lines,
            link: EspUsbLink::new(config.write_timeout_ms),
            timer,
            log,
        };

        match Session::new(platform, config, &LOG_STREAM) {
            Ok(mut session) => {
                session.drain_logs();
                session.run()
            }
            // Validated above
            Err(_) => park(None),
        }
    }
}

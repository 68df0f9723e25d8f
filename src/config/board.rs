//! ESP32-S3 line assignment.
//!
//! Excluded from sampling: strapping pins (0, 3, 45, 46), USB D-/D+
//! (19, 20, the data link), flash/PSRAM (26-37), UART0 (43, 44) and the
//! log TX line.

use crate::pins::LineId;

/// Sampled inputs, in bit order.
pub const INPUT_LINES: [LineId; 20] = [
    1, 2, 4, 5, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 21, 38, 39, 40,
];

/// Sample-window synchronization output.
pub const SYNC_LINE: LineId = 42;

/// "Session running" indicator output.
pub const STATUS_LINE: LineId = 41;

/// Log UART TX (UART1). Quad flash boards only, conflicts with octal PSRAM.
pub const LOG_TX_LINE: LineId = 6;

/// Log UART baud rate.
pub const LOG_BAUD: u32 = 115_200;

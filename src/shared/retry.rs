use std::thread;
use std::time::Duration;

/// Runs `op` up to `attempts` times with a fixed `delay` between tries.
/// Contention on the transport directory is expected, not exceptional: the
/// external process may still hold a file open while we read or delete it.
/// Only the last error survives once the attempt budget is spent.
pub fn retry_io<T>(
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> std::io::Result<T>,
) -> std::io::Result<T> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("retry budget was zero")))
}

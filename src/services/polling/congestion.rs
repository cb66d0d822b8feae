/// Decides, once per tick, whether the backend is falling behind.
///
/// Congestion is a level: it holds on every tick that still finds the
/// previous query outstanding and clears on the first tick that does not.
pub struct CongestionDetector;

impl CongestionDetector {
    pub fn detect(pending: bool) -> bool {
        pending
    }
}

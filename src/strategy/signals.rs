use crate::models::{Bar, Signal};

/// Two-bar close comparison
///
/// Buy when the last close is strictly above the one before it, otherwise
/// hold. Fewer than two bars cannot be evaluated and also yield `Hold`.
pub fn evaluate(bars: &[Bar]) -> Signal {
    match bars {
        [.., previous, last] if last.close > previous.close => Signal::Buy,
        _ => Signal::Hold,
    }
}

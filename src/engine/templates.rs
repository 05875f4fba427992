//! Fixed-template prompt wording
//!
//! Each depth maps to a declared set of equivalent phrasings. Which member is
//! picked is cosmetic; nothing downstream may depend on it.

use super::GenerateError;
use crate::protocol::ProbeDepth;
use rand::seq::SliceRandom;
use rand::Rng;

pub const CLOSING_MESSAGE: &str =
    "You've completed this reflection. Feel free to explore another emotion or press 'F' to finish.";

/// Every phrasing the engine may send for this input.
///
/// `depth` is the respondent event's depth. Only the latest answer and the
/// two most recent answers are ever looked at.
pub fn phrasings(
    emotion_label: &str,
    history: &[String],
    depth: ProbeDepth,
) -> Result<Vec<String>, GenerateError> {
    let last = history.last().map_or("", String::as_str);
    let emotion_lower = emotion_label.to_lowercase();

    let set = match depth.get() {
        0 => vec![format!(
            "You selected {emotion_label}. Let's take a moment to reflect. What happened today that made you feel this way?"
        )],
        2 => vec![
            format!(
                "That's a great moment to reflect on. When you think about {last}, what details stand out the most?"
            ),
            format!(
                "Can you walk me through what was happening right before {last} occurred? What set the stage for it?"
            ),
        ],
        4 => {
            let mut set = vec![
                format!(
                    "Thinking about {last}, how did it make you feel in the moment? Did those emotions shift as time passed?"
                ),
                format!(
                    "Has a moment like {last} happened before in your life? What patterns do you notice in how you experience {emotion_lower}?"
                ),
            ];
            if let [earlier, latest] = recent_window(history) {
                set.push(format!(
                    "You started with {earlier} and then described {latest}. How did your feelings change between those two moments?"
                ));
            }
            set
        }
        6 => vec![CLOSING_MESSAGE.to_string()],
        _ => return Err(GenerateError::UnsupportedDepth(depth)),
    };
    Ok(set)
}

/// Pick one phrasing using `rng`
pub fn generate_with<R: Rng + ?Sized>(
    emotion_label: &str,
    history: &[String],
    depth: ProbeDepth,
    rng: &mut R,
) -> Result<String, GenerateError> {
    let set = phrasings(emotion_label, history, depth)?;
    set.choose(rng)
        .cloned()
        .ok_or(GenerateError::UnsupportedDepth(depth))
}

/// Pick one phrasing at random
pub fn generate(
    emotion_label: &str,
    history: &[String],
    depth: ProbeDepth,
) -> Result<String, GenerateError> {
    generate_with(emotion_label, history, depth, &mut rand::thread_rng())
}

/// Up to the last two answers, oldest first
fn recent_window(history: &[String]) -> &[String] {
    &history[history.len().saturating_sub(2)..]
}

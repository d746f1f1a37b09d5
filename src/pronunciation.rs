use serde::{Deserialize, Serialize};

/// Scores at or above this are counted as a correct attempt
pub const CORRECT_THRESHOLD: u8 = 80;

pub const PERFECT_MESSAGE: &str = "Perfect! You said it correctly!";

/// One rung of the feedback ladder: the message used when a score reaches `min_score`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTier {
    pub min_score: u8,
    pub template: &'static str,
}

impl FeedbackTier {
    /// Render the message, embedding the target word as the caller wrote it
    pub fn render(&self, target: &str) -> String {
        self.template.replace("{target}", target)
    }
}

/// Evaluated top-down, first tier reached wins. The last tier must stay at 0.
pub const FEEDBACK_LADDER: [FeedbackTier; 5] = [
    FeedbackTier {
        min_score: 90,
        template: "Excellent! Very close to perfect!",
    },
    FeedbackTier {
        min_score: 80,
        template: "Great job! That's correct!",
    },
    FeedbackTier {
        min_score: 60,
        template: "Good try! The word is '{target}'. Try again!",
    },
    FeedbackTier {
        min_score: 40,
        template: "Keep practicing! The word is '{target}'.",
    },
    FeedbackTier {
        min_score: 0,
        template: "Let's try again! The word is '{target}'.",
    },
];

/// Result of comparing a spoken attempt against the target word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationOutcome {
    pub score: u8,
    pub is_correct: bool,
    pub feedback: String,
}

pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Length of the longest common subsequence, over chars
pub fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit distance with insertions and deletions only; a substitution costs 2
pub fn indel_distance(a: &str, b: &str) -> usize {
    a.chars().count() + b.chars().count() - 2 * lcs_len(a, b)
}

/// Characters on both sides that survive the alignment, and the combined length
fn matched_and_total(a: &str, b: &str) -> (usize, usize) {
    let total = a.chars().count() + b.chars().count();
    (2 * lcs_len(a, b), total)
}

/// Normalized indel similarity in [0, 1]: `1 - indel / (len_a + len_b)`,
/// 1.0 when both strings are empty
pub fn similarity(a: &str, b: &str) -> f64 {
    let (matched, total) = matched_and_total(a, b);
    if total == 0 {
        return 1.0;
    }
    matched as f64 / total as f64
}

/// `similarity` as a truncated percentage, kept in integers so 80 is exactly 80
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let (matched, total) = matched_and_total(a, b);
    if total == 0 {
        return 100;
    }
    // matched <= total, so the quotient is at most 100
    (matched * 100 / total) as u8
}

pub fn feedback_for(score: u8, target: &str) -> String {
    FEEDBACK_LADDER
        .iter()
        .find(|tier| score >= tier.min_score)
        .map(|tier| tier.render(target))
        .unwrap_or_else(|| FEEDBACK_LADDER[FEEDBACK_LADDER.len() - 1].render(target))
}

/// Compare a transcription with the target word.
///
/// Both sides are trimmed and lowercased first. An exact match is perfect
/// without consulting the similarity metric; otherwise the score is the
/// truncated similarity percentage and feedback comes from the ladder.
pub fn score_pronunciation(target: &str, spoken: &str) -> PronunciationOutcome {
    let target_norm = normalize(target);
    let spoken_norm = normalize(spoken);

    if target_norm == spoken_norm {
        return PronunciationOutcome {
            score: 100,
            is_correct: true,
            feedback: PERFECT_MESSAGE.to_string(),
        };
    }

    let score = similarity_score(&target_norm, &spoken_norm);

    PronunciationOutcome {
        score,
        is_correct: score >= CORRECT_THRESHOLD,
        feedback: feedback_for(score, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcs_and_indel_distance() {
        assert_eq!(lcs_len("kitten", "sitting"), 4);
        assert_eq!(indel_distance("kitten", "sitting"), 5);
        assert_eq!(indel_distance("dog", "dag"), 2);
        assert_eq!(indel_distance("dog", "cat"), 6);
        assert_eq!(indel_distance("", "abc"), 3);
        assert_eq!(indel_distance("abc", ""), 3);
        assert_eq!(indel_distance("", ""), 0);
    }

    #[test]
    fn test_distance_counts_chars_not_bytes() {
        assert_eq!(indel_distance("café", "cafe"), 2);
        assert_eq!(lcs_len("über", "uber"), 3);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("apple", "apple"), 1.0);
        assert_eq!(similarity("dog", "cat"), 0.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("apple", "appel"), 0.8);
    }

    #[test]
    fn test_similarity_score_truncates() {
        // 4/6 = 0.666..
        assert_eq!(similarity_score("dog", "dag"), 66);
        // 10/11 = 0.909..
        assert_eq!(similarity_score("banana", "banan"), 90);
        // exactly 0.8 stays 80 in integer arithmetic
        assert_eq!(similarity_score("horse", "house"), 80);
    }

    #[test]
    fn test_exact_match_after_normalization() {
        let outcome = score_pronunciation("Dog", " dog ");
        assert_eq!(outcome.score, 100);
        assert!(outcome.is_correct);
        assert_eq!(outcome.feedback, PERFECT_MESSAGE);
    }

    #[test]
    fn test_both_empty_is_perfect() {
        let outcome = score_pronunciation("", "   ");
        assert_eq!(outcome.score, 100);
        assert!(outcome.is_correct);
    }

    #[test]
    fn test_empty_spoken_scores_zero() {
        let outcome = score_pronunciation("Ball", "");
        assert_eq!(outcome.score, 0);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.feedback, "Let's try again! The word is 'Ball'.");
    }

    #[test]
    fn test_disjoint_words_score_low() {
        let outcome = score_pronunciation("Dog", "Cat");
        assert!(outcome.score < 40);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.feedback, "Let's try again! The word is 'Dog'.");
    }

    #[test]
    fn test_threshold_eighty_is_correct_with_great_job() {
        let outcome = score_pronunciation("Horse", "house");
        assert_eq!(outcome.score, 80);
        assert!(outcome.is_correct);
        assert_eq!(outcome.feedback, "Great job! That's correct!");
    }

    #[test]
    fn test_swapped_letters_count_as_correct() {
        let outcome = score_pronunciation("Apple", "appel");
        assert_eq!(outcome.score, 80);
        assert!(outcome.is_correct);
        assert_eq!(outcome.feedback, "Great job! That's correct!");
    }

    #[test]
    fn test_one_missing_letter_in_long_word_is_excellent() {
        // 18/19 = 0.947..
        let outcome = score_pronunciation("Strawberry", "strawbery");
        assert_eq!(outcome.score, 94);
        assert!(outcome.is_correct);
        assert_eq!(outcome.feedback, "Excellent! Very close to perfect!");
    }

    #[test]
    fn test_good_try_tier_keeps_target_casing() {
        let outcome = score_pronunciation("Apple", "apl");
        assert_eq!(outcome.score, 75);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.feedback, "Good try! The word is 'Apple'. Try again!");

        let outcome = score_pronunciation("Banana", "bnn");
        assert_eq!(outcome.score, 66);
        assert_eq!(outcome.feedback, "Good try! The word is 'Banana'. Try again!");
    }

    #[test]
    fn test_keep_practicing_tier() {
        let outcome = score_pronunciation("Dog", "dag");
        assert_eq!(outcome.score, 66);
        assert!(!outcome.is_correct);

        let outcome = score_pronunciation("Dog", "d");
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.feedback, "Keep practicing! The word is 'Dog'.");
    }

    #[test]
    fn test_ladder_is_descending_and_total() {
        for pair in FEEDBACK_LADDER.windows(2) {
            assert!(pair[0].min_score > pair[1].min_score);
        }
        assert_eq!(FEEDBACK_LADDER[FEEDBACK_LADDER.len() - 1].min_score, 0);
    }

    #[test]
    fn test_feedback_for_boundaries() {
        assert_eq!(feedback_for(100, "x"), "Excellent! Very close to perfect!");
        assert_eq!(feedback_for(89, "x"), "Great job! That's correct!");
        assert_eq!(feedback_for(79, "x"), "Good try! The word is 'x'. Try again!");
        assert_eq!(feedback_for(59, "x"), "Keep practicing! The word is 'x'.");
        assert_eq!(feedback_for(39, "x"), "Let's try again! The word is 'x'.");
    }
}

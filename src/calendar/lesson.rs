use crate::models::event::LessonType;

const LABORATORY_KEYWORDS: &[&str] = &["лаборатор", "laborator"];
const PRACTICE_KEYWORDS: &[&str] = &["практичн", "practic"];

fn keyword_type(text: &str) -> Option<LessonType> {
    let lower = text.to_lowercase();
    if contains_any(&lower, LABORATORY_KEYWORDS) {
        Some(LessonType::Laboratory)
    } else if contains_any(&lower, PRACTICE_KEYWORDS) {
        Some(LessonType::Practice)
    } else {
        None
    }
}

fn contains_any(text: &str, keys: &[&str]) -> bool {
    keys.iter().any(|k| text.contains(k))
}

/// Classifies a lesson from its cleaned title, falling back to the
/// parenthetical tag the parser stripped from it. Lecture when neither matches.
pub fn infer_lesson_type(summary: &str, lesson_tag: Option<&str>) -> LessonType {
    keyword_type(summary)
        .or_else(|| lesson_tag.and_then(keyword_type))
        .unwrap_or_default()
}

/// Display icon for an event title. Covers more categories than
/// [`LessonType`] since exams and consultations only matter for rendering.
pub fn event_icon(summary: &str) -> &'static str {
    let lower = summary.to_lowercase();
    let has = |keys: &[&str]| contains_any(&lower, keys);

    if has(&["лекці", "lecture"][..]) {
        "📚"
    } else if has(LABORATORY_KEYWORDS) {
        "🔬"
    } else if has(PRACTICE_KEYWORDS) {
        "✍️"
    } else if has(&["семінар", "seminar"][..]) {
        "💬"
    } else if has(&["іспит", "екзамен", "exam"][..]) {
        "📝"
    } else if has(&["залік", "credit test"][..]) {
        "✅"
    } else if has(&["консультац", "consultation"][..]) {
        "💡"
    } else {
        "📌"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_from_summary_case_insensitively() {
        assert_eq!(infer_lesson_type("LABORATORY work", None), LessonType::Laboratory);
        assert_eq!(infer_lesson_type("Практичне заняття", None), LessonType::Practice);
        assert_eq!(infer_lesson_type("Algorithms", None), LessonType::Lecture);
    }

    #[test]
    fn falls_back_to_stripped_tag() {
        assert_eq!(
            infer_lesson_type("Технології захисту інформації", Some("лабораторне заняття")),
            LessonType::Laboratory
        );
        assert_eq!(
            infer_lesson_type("Practice of law", Some("laboratory session")),
            LessonType::Practice
        );
        assert_eq!(infer_lesson_type("History", Some("online")), LessonType::Lecture);
    }

    #[test]
    fn icons_cover_display_categories() {
        assert_eq!(event_icon("Final exam"), "📝");
        assert_eq!(event_icon("Консультація"), "💡");
        assert_eq!(event_icon("Physics"), "📌");
        assert_eq!(event_icon("Intro lecture"), "📚");
    }
}

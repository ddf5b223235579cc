use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::answer::{Answer, TestCaseResult};
use crate::models::attempt::Attempt;
use crate::models::question::{ChoiceDetails, CodingDetails, Question, QuestionDetails};
use crate::models::score::{QuestionScore, ScoreReport};
use crate::models::test::Test;

pub struct ScoringService;

impl ScoringService {
    /// Scores every question of `test` in section order against the answers
    /// recorded on `attempt`. Unanswered questions score zero.
    pub fn score(test: &Test, attempt: &Attempt) -> ScoreReport {
        let mut per_question = Vec::new();

        for section in test.ordered_sections() {
            let section_attempt = attempt.section_attempt(section.id);
            for question in &section.questions {
                let answer = section_attempt
                    .and_then(|s| s.answer_for(question.id))
                    .map(|a| &a.answer);
                per_question.push(Self::score_question(section.id, question, answer));
            }
        }

        let max_score: f64 = per_question.iter().map(|q| q.max_points).sum();
        let total_score: f64 = per_question.iter().map(|q| q.earned).sum();

        ScoreReport {
            total_score,
            max_score,
            percentage: percentage(total_score, max_score),
            per_question,
        }
    }

    pub fn score_question(
        section_id: Uuid,
        question: &Question,
        answer: Option<&Answer>,
    ) -> QuestionScore {
        let max_points = question.max_points();
        let attempted = answer.map(|a| !a.is_blank()).unwrap_or(false);

        let mut passed_test_cases = None;
        let mut total_test_cases = None;

        // A blank answer scores like no answer at all.
        let answer = answer.filter(|a| !a.is_blank());
        let (earned, is_correct) = match (&question.details, answer) {
            (QuestionDetails::SingleCorrect(choices), Some(Answer::SingleCorrect { selected_options })) => {
                let correct = is_single_correct(choices, selected_options);
                (if correct { max_points } else { 0.0 }, correct)
            }
            (QuestionDetails::MultiCorrect(choices), Some(Answer::MultiCorrect { selected_options })) => {
                let correct = is_multi_correct(choices, selected_options);
                (if correct { max_points } else { 0.0 }, correct)
            }
            (QuestionDetails::Coding(coding), Some(Answer::Coding { test_case_results, .. })) => {
                let (passed, total) = count_passed(coding, test_case_results);
                passed_test_cases = Some(passed);
                total_test_cases = Some(total);
                (coding_credit(max_points, passed, total), total > 0 && passed == total)
            }
            (QuestionDetails::Coding(coding), None) => {
                passed_test_cases = Some(0);
                total_test_cases = Some(coding.test_cases.len());
                (0.0, false)
            }
            _ => (0.0, false),
        };

        QuestionScore {
            question_id: question.id,
            section_id,
            question_type: question.question_type(),
            earned,
            earned_display: round_to(earned, 1),
            max_points,
            is_correct,
            attempted,
            passed_test_cases,
            total_test_cases,
        }
    }
}

fn is_single_correct(choices: &ChoiceDetails, selected: &[usize]) -> bool {
    match selected {
        [only] => choices.correct_indices() == [*only],
        _ => false,
    }
}

fn is_multi_correct(choices: &ChoiceDetails, selected: &[usize]) -> bool {
    let selected: BTreeSet<usize> = selected.iter().copied().collect();
    let correct: BTreeSet<usize> = choices.correct_indices().into_iter().collect();
    !selected.is_empty() && selected == correct
}

/// Returns `(passed, total)`. The denominator is always the question's own
/// test-case count, never the number of reported results.
fn count_passed(coding: &CodingDetails, results: &[TestCaseResult]) -> (usize, usize) {
    let total = coding.test_cases.len();
    let passed = results.iter().filter(|r| r.passed).count().min(total);
    (passed, total)
}

fn coding_credit(points: f64, passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    if passed == total {
        return points;
    }
    points * passed as f64 / total as f64
}

pub fn percentage(total_score: f64, max_score: f64) -> i32 {
    if max_score <= 0.0 {
        return 0;
    }
    (total_score / max_score * 100.0).round() as i32
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::SubmittedAnswer;
    use crate::models::attempt::{SectionAttempt, STATUS_IN_PROGRESS};
    use crate::models::question::{QuestionOption, TestCase};
    use crate::models::test::{ProctoringConfig, Section};
    use chrono::Utc;
    use sqlx::types::Json;

    fn choice(options: &[bool]) -> ChoiceDetails {
        ChoiceDetails {
            options: options
                .iter()
                .enumerate()
                .map(|(i, c)| QuestionOption {
                    text: format!("option {}", i),
                    is_correct: *c,
                })
                .collect(),
        }
    }

    fn question(details: QuestionDetails, points: Option<f64>) -> Question {
        Question {
            id: Uuid::new_v4(),
            question: "q".into(),
            points,
            details,
        }
    }

    fn coding(cases: usize) -> QuestionDetails {
        QuestionDetails::Coding(CodingDetails {
            problem_statement: "echo".into(),
            input_format: None,
            output_format: None,
            examples: vec![],
            constraints: None,
            test_cases: (0..cases)
                .map(|i| TestCase {
                    input: i.to_string(),
                    output: i.to_string(),
                    is_hidden: i > 0,
                })
                .collect(),
        })
    }

    fn results(passed: &[bool]) -> Vec<TestCaseResult> {
        passed
            .iter()
            .map(|p| TestCaseResult {
                passed: *p,
                input: String::new(),
                expected_output: String::new(),
                actual_output: String::new(),
                error: None,
            })
            .collect()
    }

    fn single_section_test(questions: Vec<Question>) -> Test {
        let now = Utc::now();
        Test {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            start_date: now,
            end_date: now,
            duration_minutes: 30,
            sections: Json(vec![Section {
                id: Uuid::new_v4(),
                name: "s".into(),
                time_limit_minutes: 30,
                questions,
                order: 0,
            }]),
            proctoring: Json(ProctoringConfig::default()),
            is_active: true,
            allowed_student_ids: vec![],
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn attempt_with(test: &Test, answers: Vec<(Uuid, Answer)>) -> Attempt {
        let now = Utc::now();
        let section_id = test.sections.0[0].id;
        Attempt {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            test_id: test.id,
            status: STATUS_IN_PROGRESS.into(),
            start_time: Some(now),
            end_time: None,
            current_section_index: 0,
            section_attempts: Json(vec![SectionAttempt {
                section_id,
                answers: answers
                    .into_iter()
                    .map(|(question_id, answer)| SubmittedAnswer {
                        question_id,
                        answer,
                        answered_at: now,
                    })
                    .collect(),
                completed_at: None,
            }]),
            violations: Json(vec![]),
            total_score: None,
            max_score: None,
            percentage: None,
            score_report: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn single_correct_only_awards_the_correct_index() {
        let q = question(
            QuestionDetails::SingleCorrect(choice(&[false, true, false, false])),
            Some(2.0),
        );
        let section = Uuid::new_v4();
        let right = Answer::SingleCorrect { selected_options: vec![1] };
        let wrong = Answer::SingleCorrect { selected_options: vec![2] };
        let both = Answer::SingleCorrect { selected_options: vec![1, 2] };

        assert_eq!(ScoringService::score_question(section, &q, Some(&right)).earned, 2.0);
        assert_eq!(ScoringService::score_question(section, &q, Some(&wrong)).earned, 0.0);
        assert_eq!(ScoringService::score_question(section, &q, Some(&both)).earned, 0.0);
    }

    #[test]
    fn multi_correct_requires_the_exact_set() {
        let q = question(
            QuestionDetails::MultiCorrect(choice(&[true, false, true, false])),
            None,
        );
        let test = single_section_test(vec![q.clone()]);

        let exact = attempt_with(&test, vec![(q.id, Answer::MultiCorrect { selected_options: vec![2, 0] })]);
        assert_eq!(ScoringService::score(&test, &exact).total_score, 1.0);

        for selection in [vec![0], vec![0, 1, 2], vec![1, 3]] {
            let attempt = attempt_with(&test, vec![(q.id, Answer::MultiCorrect { selected_options: selection })]);
            let report = ScoringService::score(&test, &attempt);
            assert_eq!(report.total_score, 0.0);
            assert!(report.per_question[0].attempted);
        }
    }

    #[test]
    fn coding_awards_partial_credit() {
        let q = question(coding(3), Some(10.0));
        let test = single_section_test(vec![q.clone()]);
        let answer = Answer::Coding {
            code: "print(input())".into(),
            language: "python".into(),
            test_case_results: results(&[true, true, false]),
        };
        let report = ScoringService::score(&test, &attempt_with(&test, vec![(q.id, answer)]));

        let entry = &report.per_question[0];
        assert!((entry.earned - 20.0 / 3.0).abs() < 1e-9);
        assert_eq!(entry.earned_display, 6.7);
        assert!(!entry.is_correct);
        assert_eq!(entry.passed_test_cases, Some(2));
        assert_eq!(report.percentage, 67);
    }

    #[test]
    fn coding_full_credit_only_when_all_pass() {
        let q = question(coding(2), Some(5.0));
        let section = Uuid::new_v4();
        let all = Answer::Coding {
            code: "x".into(),
            language: "cpp".into(),
            test_case_results: results(&[true, true]),
        };
        let partial = Answer::Coding {
            code: "x".into(),
            language: "cpp".into(),
            test_case_results: results(&[true]),
        };
        let full = ScoringService::score_question(section, &q, Some(&all));
        assert_eq!(full.earned, 5.0);
        assert!(full.is_correct);
        let half = ScoringService::score_question(section, &q, Some(&partial));
        assert_eq!(half.earned, 2.5);
        assert!(!half.is_correct);
    }

    #[test]
    fn max_score_defaults_points_to_one() {
        let qs = vec![
            question(QuestionDetails::SingleCorrect(choice(&[true, false])), None),
            question(QuestionDetails::MultiCorrect(choice(&[true, true])), Some(3.0)),
            question(coding(1), Some(10.0)),
        ];
        let test = single_section_test(qs);
        let report = ScoringService::score(&test, &attempt_with(&test, vec![]));
        assert_eq!(report.max_score, 14.0);
        assert_eq!(report.total_score, 0.0);
        assert_eq!(report.attempted_count(), 0);
    }

    #[test]
    fn blank_answers_are_unattempted_and_score_zero() {
        let q = question(QuestionDetails::SingleCorrect(choice(&[true, false])), None);
        let blank = Answer::SingleCorrect { selected_options: vec![] };
        let scored = ScoringService::score_question(Uuid::new_v4(), &q, Some(&blank));
        assert!(!scored.attempted);
        assert_eq!(scored.earned, 0.0);
    }

    #[test]
    fn blank_coding_answer_ignores_reported_results() {
        let q = question(coding(3), Some(10.0));
        let blank = Answer::Coding {
            code: "   ".into(),
            language: "python".into(),
            test_case_results: results(&[true, true, true]),
        };
        let scored = ScoringService::score_question(Uuid::new_v4(), &q, Some(&blank));
        assert!(!scored.attempted);
        assert_eq!(scored.earned, 0.0);
        assert!(!scored.is_correct);
        assert_eq!(scored.passed_test_cases, Some(0));
        assert_eq!(scored.total_test_cases, Some(3));
    }

    #[test]
    fn coding_without_test_cases_scores_zero() {
        let q = question(coding(0), Some(10.0));
        let answer = Answer::Coding {
            code: "print(1)".into(),
            language: "python".into(),
            test_case_results: results(&[true]),
        };
        let scored = ScoringService::score_question(Uuid::new_v4(), &q, Some(&answer));
        assert!(scored.attempted);
        assert_eq!(scored.earned, 0.0);
        assert!(!scored.is_correct);
        assert_eq!(scored.passed_test_cases, Some(0));
        assert_eq!(scored.total_test_cases, Some(0));
    }

    #[test]
    fn mismatched_answer_variant_scores_zero() {
        let q = question(QuestionDetails::SingleCorrect(choice(&[true, false])), None);
        let wrong_shape = Answer::MultiCorrect { selected_options: vec![0] };
        let scored = ScoringService::score_question(Uuid::new_v4(), &q, Some(&wrong_shape));
        assert_eq!(scored.earned, 0.0);
        assert!(!scored.is_correct);
    }

    #[test]
    fn percentage_is_zero_without_points() {
        assert_eq!(percentage(0.0, 0.0), 0);
        assert_eq!(percentage(1.0, 3.0), 33);
        assert_eq!(percentage(2.0, 3.0), 67);
    }
}

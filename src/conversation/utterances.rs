use super::question::Question;

pub(crate) fn greeting(
    candidate_name: &str,
    job_title: &str,
    total: usize,
    first: &Question,
) -> String {
    let noun = if total == 1 { "question" } else { "questions" };
    format!(
        "Hello {}! Welcome to your interview for the {} position. I'm your AI interviewer today. \
         I'll be asking you {} {}. Please answer each one thoughtfully. Let's begin! \
         First question: \"{}\"",
        candidate_name, job_title, total, noun, first.text
    )
}

pub(crate) fn transition(next: &Question) -> String {
    format!("Thank you for your answer. Next question: \"{}\"", next.text)
}

pub(crate) fn closing(candidate_name: &str) -> String {
    format!(
        "Thank you for completing the interview, {}! That concludes our session.",
        candidate_name
    )
}

pub(crate) fn repeat(current: &Question) -> String {
    format!("Of course! Let me repeat the question: \"{}\"", current.text)
}

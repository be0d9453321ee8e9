// All LLM prompt templates for the interview pipeline.
// Placeholders are `{name}` and are filled with `str::replace` before sending.

/// Positive classification token. A verdict is valid only if the reply starts with it.
pub const VALID_TOKEN: &str = "VALID_RESUME";
/// Negative classification token.
pub const INVALID_TOKEN: &str = "NOT_RESUME";
/// In fused replies, only lines after this marker are parsed as questions.
pub const QUESTIONS_MARKER: &str = "QUESTIONS:";

/// Résumé classification prompt. Replace: {resume_text}
pub const VALIDATION_PROMPT_TEMPLATE: &str = r#"Analyze the following text and determine if this is a professional resume/CV.

Text to analyze:
{resume_text}

A resume typically contains:
- Personal information (name, contact details)
- Work experience or employment history
- Education details
- Skills section
- Professional summary or objective

Respond with only "VALID_RESUME" if this appears to be a resume, or "NOT_RESUME" if it's not a resume.
If it's not a resume, follow the token with a colon and briefly explain what type of document it appears to be."#;

/// Question generation prompt. Replace: {count}, {job_title}, {resume_text}
pub const QUESTIONS_PROMPT_TEMPLATE: &str = r#"Based on the following resume content, generate exactly {count} relevant and specific interview questions for the position of {job_title}.

Resume Content:
{resume_text}

Requirements:
1. Questions should be specific to the candidate's experience mentioned in the resume
2. Include both technical and behavioral questions appropriate for {job_title}
3. Questions should help assess the candidate's fit for the role
4. Format each question as: "1. Question text"
5. Make questions challenging but fair
6. Include questions about specific projects, technologies, or experiences mentioned in the resume

Generate exactly {count} questions in numbered format."#;

/// Fused validation + question prompt. Replace: {count}, {job_title}, {resume_text}
pub const FUSED_PROMPT_TEMPLATE: &str = r#"You will do two things with the document below.

STEP 1: Decide whether it is a professional resume/CV (contact details, work history, education, skills, summary).
If it is NOT a resume, reply with exactly one line:
NOT_RESUME: <what kind of document it appears to be>
and nothing else.

STEP 2: If it IS a resume, reply in this exact layout:
VALID_RESUME
QUESTIONS:
1. Question text
2. Question text
...

Generate exactly {count} interview questions for the position of {job_title}. Mix technical and behavioral questions, and make each one specific to projects, technologies, or experiences named in the resume.

Document:
{resume_text}"#;

/// STAR guidance shared by both answer strategies.
pub const STAR_GUIDELINES: &str = "\
STAR Method Guidelines:
- Situation: Set the context and background
- Task: Describe what needed to be accomplished
- Action: Explain the specific actions taken
- Result: Share the outcomes and what was learned";

/// Batched answer prompt. Replace: {job_title}, {resume_text}, {star_guidelines},
/// {voice_instruction}, {questions}
pub const BATCH_ANSWERS_PROMPT_TEMPLATE: &str = r#"Generate professional sample answers for the following interview questions using the STAR method (Situation, Task, Action, Result).

Job Position: {job_title}
Candidate's Resume:
{resume_text}

{star_guidelines}

{voice_instruction}
Keep each answer concise but comprehensive (3-4 sentences), relevant to the {job_title} role.

Questions to answer:
{questions}

Format your response exactly as:
ANSWER_1:
Situation: ...
Task: ...
Action: ...
Result: ...
ANSWER_2:
Situation: ...
...and so on for all questions. Start each STAR component on a new line."#;

/// Single-question answer prompt. Replace: {job_title}, {resume_text},
/// {star_guidelines}, {voice_instruction}, {question}
pub const SINGLE_ANSWER_PROMPT_TEMPLATE: &str = r#"Write a professional sample answer to one interview question using the STAR method.

Job Position: {job_title}
Candidate's Resume:
{resume_text}

{star_guidelines}

{voice_instruction}

Question: {question}

Reply with exactly these four lines and nothing else:
Situation: ...
Task: ...
Action: ...
Result: ..."#;

//! Prompt templates for course outlines and lesson bodies.

pub const COURSE_SYSTEM_PROMPT: &str = "You are an expert instructional designer who builds online courses. \
Create well organized, pedagogically sound course structures. \
Always answer with valid JSON exactly in the requested format.";

pub fn course_structure_prompt(topic: &str, audience: &str, module_count: u32) -> String {
    format!(
        r#"Create a detailed course plan on the topic "{topic}" for "{audience}", split into {module_count} modules.

Requirements:
- Each module must have between 3 and 5 lessons
- The course must progress from fundamentals to advanced material
- Include a short course description (2-3 sentences)
- Include a description for each module (1-2 sentences)
- Titles must be clear and specific (at most 200 characters)
- Content must be technical and educational
- Optionally include up to 5 multiple choice quiz questions with exactly one correct option each

Return the result EXACTLY in the JSON format below:
{{
  "courseTitle": "Course title",
  "courseDescription": "Course description",
  "modules": [
    {{
      "moduleTitle": "Module 1 title",
      "moduleDescription": "Module 1 description",
      "lessons": ["Lesson 1 title", "Lesson 2 title", "Lesson 3 title"]
    }}
  ],
  "quizQuestions": [
    {{
      "question": "Question 1?",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correctAnswerIndex": 0,
      "explanation": "Why the correct option is correct"
    }}
  ]
}}"#
    )
}

pub const LESSON_SYSTEM_PROMPT: &str = "You are an expert educator who writes technical learning material. \
Write high quality, well structured and didactic lesson content.";

pub fn lesson_content_prompt(
    lesson_title: &str,
    course_title: &str,
    module_title: &str,
    audience: &str,
) -> String {
    format!(
        r#"Write detailed, technical lesson content for the lesson "{lesson_title}" of the module "{module_title}" in the course "{course_title}".

Audience: {audience}

Requirements:
- Between 800 and 1500 words
- Technical but approachable language
- Include practical examples where relevant
- Organize the text with headings and well structured paragraphs
- Focus on core concepts and practical applications
- Use markdown for formatting (headings, lists, code where it applies)

Return only the lesson content in markdown, with no remarks about the task."#
    )
}

//! Prompt templates for each reasoning task.
//!
//! Templates use Tera syntax and are registered under the names below.

pub const RELEVANCE_SYSTEM: &str = "relevance_system";
pub const RELEVANCE_USER: &str = "relevance_user";
pub const SQL_SYSTEM: &str = "sql_system";
pub const SQL_USER: &str = "sql_user";
pub const SUMMARY_SYSTEM: &str = "summary_system";
pub const SUMMARY_USER: &str = "summary_user";
pub const DECLINE_SYSTEM: &str = "decline_system";
pub const DECLINE_USER: &str = "decline_user";
pub const REFORMULATE_SYSTEM: &str = "reformulate_system";
pub const REFORMULATE_USER: &str = "reformulate_user";

pub const TEMPLATES: &[(&str, &str)] = &[
    (
        RELEVANCE_SYSTEM,
        r#"You are an assistant that decides whether a question can be answered from the following database schema.

Schema:
{{ schema }}

Respond with only "relevant" or "not_relevant"."#,
    ),
    (RELEVANCE_USER, "Question: {{ question }}"),
    (
        SQL_SYSTEM,
        r#"You translate natural language questions into a single SQL statement for the following schema:

{{ schema }}

The current question is '{{ question }}'. Scope all query data to this question.

Reply with the SQL statement only, without explanations or markdown.
Alias columns so that result keys are descriptive, for example alias 'food.name' as 'food_name' and 'food.price' as 'price'."#,
    ),
    (SQL_USER, "Question: {{ question }}"),
    (
        SUMMARY_SYSTEM,
        "You turn SQL query results into clear natural language answers. Never mention identifiers such as IDs.",
    ),
    (
        SUMMARY_USER,
        "SQL Query:\n{{ sql }}\nResult:\n{{ result }}\n{{ instruction }}",
    ),
    (
        DECLINE_SYSTEM,
        "You are a charming and funny assistant who responds in a playful manner.",
    ),
    (
        DECLINE_USER,
        "I can not help with that, but every question brings you closer to the problem. You can always revise the data.",
    ),
    (
        REFORMULATE_SYSTEM,
        "You are an assistant that reformulates an original question to enable more precise SQL queries.",
    ),
    (
        REFORMULATE_USER,
        "Original Question: {{ question }}\nReformulate the question to enable more precise SQL queries. Reply with the reformulated question only.",
    ),
];

pub mod openai_responses;

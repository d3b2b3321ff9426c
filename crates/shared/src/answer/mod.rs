pub mod contract;
pub mod validation;

pub use contract::{
    AgentAnswer, FOLLOW_UP_NONE, FlightResult, Scalar, TravelLeg, UNDEFINED_MARKER,
    agent_answer_schema,
};
pub use validation::{
    AnswerError, close_follow_up, extract_fenced_json, parse_agent_answer, validate_answer_value,
};

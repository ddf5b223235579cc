pub mod answer;
pub mod attempt;
pub mod question;
pub mod score;
pub mod test;
pub mod user;
pub mod violation;

pub mod conversations;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;

pub mod env_token;

//! Record types and row builders shared by the integration tests.

#![allow(dead_code)]

use relorm::{Model, Row, Value};

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[relorm(table = "users")]
pub struct User {
    #[relorm(column = "id", constraints = "primary key,auto_increment")]
    pub id: i64,
    #[relorm(column = "name", constraints = "not null")]
    pub name: String,
    #[relorm(column = "email", constraints = "unique,not null,length:120")]
    pub email: String,
    #[relorm(column = "age", constraints = "default:0,check:(age >= 0)")]
    pub age: i32,
    #[relorm(has_many(foreign_key = "user_id"))]
    pub posts: Vec<Post>,
    #[relorm(has_one(foreign_key = "user_id"))]
    pub profile: Option<Profile>,
    /// Not mapped: never part of generated SQL
    pub session_token: String,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
pub struct Post {
    #[relorm(column = "id", constraints = "primary key,auto_increment")]
    pub id: i64,
    #[relorm(column = "user_id", constraints = "not null")]
    pub user_id: i64,
    #[relorm(column = "title", constraints = "index")]
    pub title: String,
    #[relorm(belongs_to(foreign_key = "user_id"))]
    pub author: Option<Box<User>>,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
pub struct Profile {
    #[relorm(column = "id", constraints = "primary key,auto_increment")]
    pub id: i64,
    #[relorm(column = "user_id")]
    pub user_id: i64,
    #[relorm(column = "bio", constraints = "type:text")]
    pub bio: String,
}

pub fn block_on<F: Future>(future: F) -> F::Output {
    asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
        .block_on(future)
}

pub fn user_row(id: i64, name: &str) -> Row {
    Row::from_pairs([
        ("id", Value::BigInt(id)),
        ("name", Value::from(name)),
        ("email", Value::Text(format!("{}@example.com", name.to_lowercase()))),
        ("age", Value::Int(30)),
    ])
}

pub fn post_row(id: i64, user_id: i64, title: &str) -> Row {
    Row::from_pairs([
        ("id", Value::BigInt(id)),
        ("user_id", Value::BigInt(user_id)),
        ("title", Value::from(title)),
    ])
}

pub fn profile_row(id: i64, user_id: i64, bio: &str) -> Row {
    Row::from_pairs([
        ("id", Value::BigInt(id)),
        ("user_id", Value::BigInt(user_id)),
        ("bio", Value::from(bio)),
    ])
}

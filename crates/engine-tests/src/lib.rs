#![allow(dead_code)]

pub mod fixture;

pub mod export;
pub mod scenarios;

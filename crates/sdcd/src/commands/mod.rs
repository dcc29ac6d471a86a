//! Command implementations

pub mod changelog;

pub mod doctor;

pub mod info;

pub mod tags;

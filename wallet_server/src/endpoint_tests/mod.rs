mod accounts;
mod flow;
mod helpers;
mod mocks;
mod orders;

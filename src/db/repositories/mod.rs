mod practice;
mod profiles;

pub mod amass;

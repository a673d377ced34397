pub mod browse;
pub mod imaging;
pub mod media;
pub mod natural_sort;
pub mod scan;

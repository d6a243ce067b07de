mod record_detail;
mod record_list;

pub use record_detail::RecordDetailView;
pub use record_list::RecordListView;

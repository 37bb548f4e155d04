/*
 * Responsibility
 * - API バージョンごとの Router の入口
 */
pub mod v1;
